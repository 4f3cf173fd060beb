//! # Plugin Parameters
//!
//! The knobs the DAW shows and automates. IDs (`#[id = "..."]`) are what
//! presets are saved against, so they must never change once published.
//!
//! The delay-related parameters are read once per block and turned into a
//! [`DelayParameters`](crate::dsp::parameters::DelayParameters) snapshot;
//! the delay line ramps feedback changes itself. Mix and output gain are
//! applied per sample by the plugin and use nih-plug's smoothers.

use nih_plug::prelude::*;

use crate::dsp::parameters::{DelayParameters, MAX_DELAY_MS, MIN_DELAY_MS};
use crate::dsp::tempo_sync::SyncDivision;

/// All user-facing parameters for Loveless Delay II.
#[derive(Params)]
pub struct PluginParams {
    /// **Delay Time** in milliseconds, used when sync is off or when the
    /// host has no tempo to sync to.
    #[id = "delay"]
    pub delay_time: IntParam,

    /// **Feedback**: how much of each echo is sent around again.
    ///
    /// Capped at 95% in the UI. The delay line itself accepts up to 100%,
    /// where the repeats stop decaying.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Sync**: lock the delay time to the host tempo.
    #[id = "sync"]
    pub sync: BoolParam,

    /// **Division**: the note length used while synced.
    #[id = "div"]
    pub division: EnumParam<SyncDivision>,

    /// **Mix**: 0% is fully dry, 100% is only the echoes.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Output** level applied after the dry/wet blend.
    #[id = "out"]
    pub output_gain: FloatParam,
}

impl Default for PluginParams {
    fn default() -> Self {
        Self {
            delay_time: IntParam::new(
                "Delay Time",
                500,
                IntRange::Linear {
                    min: MIN_DELAY_MS as i32,
                    max: MAX_DELAY_MS as i32,
                },
            )
            .with_unit(" ms"),

            feedback: FloatParam::new(
                "Feedback",
                0.40,
                FloatRange::Linear {
                    min: 0.0,
                    max: 0.95,
                },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            sync: BoolParam::new("Sync", false),

            division: EnumParam::new("Division", SyncDivision::Quarter),

            mix: FloatParam::new("Mix", 0.50, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_smoother(SmoothingStyle::Linear(20.0))
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            output_gain: FloatParam::new(
                "Output",
                util::db_to_gain(0.0),
                FloatRange::Skewed {
                    min: util::db_to_gain(-30.0),
                    max: util::db_to_gain(6.0),
                    factor: FloatRange::gain_skew_factor(-30.0, 6.0),
                },
            )
            .with_smoother(SmoothingStyle::Logarithmic(50.0))
            .with_unit(" dB")
            .with_value_to_string(formatters::v2s_f32_gain_to_db(2))
            .with_string_to_value(formatters::s2v_f32_gain_to_db()),
        }
    }
}

impl PluginParams {
    /// Take the per-block snapshot the delay line runs on. `tempo_bpm`
    /// comes from the host transport.
    pub fn delay_snapshot(&self, tempo_bpm: Option<f64>) -> DelayParameters {
        DelayParameters {
            delay_time_ms: self.delay_time.value().max(MIN_DELAY_MS as i32) as u32,
            feedback_gain: self.feedback.value(),
            sync_enabled: self.sync.value(),
            sync_division: self.division.value(),
            tempo_bpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let params = PluginParams::default();
        let snapshot = params.delay_snapshot(Some(128.0));

        assert_eq!(snapshot.delay_time_ms, 500);
        assert!((snapshot.feedback_gain - 0.4).abs() < 1e-6);
        assert!(!snapshot.sync_enabled);
        assert_eq!(snapshot.sync_division, SyncDivision::Quarter);
        assert_eq!(snapshot.tempo_bpm, Some(128.0));
    }
}
