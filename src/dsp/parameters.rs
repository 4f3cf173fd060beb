//! Per-block parameter snapshot handed to the delay line.

use super::tempo_sync::SyncDivision;

/// Shortest absolute delay time, in milliseconds.
pub const MIN_DELAY_MS: u32 = 1;
/// Longest absolute delay time, in milliseconds. The buffer sizing in
/// `DelayLine::prepare()` is built around this.
pub const MAX_DELAY_MS: u32 = 2000;
/// Feedback is clamped to unity. At 1.0 the repeats never decay; above
/// it they would grow until the output clips.
pub const MAX_FEEDBACK: f32 = 1.0;

/// Everything the delay line needs to know for one audio block.
///
/// Built once per `process()` call from the host parameters and the
/// transport, then passed by value so that no setting can change halfway
/// through a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParameters {
    /// Absolute delay time, `1..=2000` ms. Also the fallback when sync is
    /// on but the host reports no tempo.
    pub delay_time_ms: u32,
    /// How much of the delayed signal re-enters the buffer, `0.0..=1.0`.
    pub feedback_gain: f32,
    pub sync_enabled: bool,
    pub sync_division: SyncDivision,
    /// Host tempo, if the host has a transport.
    pub tempo_bpm: Option<f64>,
}

impl Default for DelayParameters {
    fn default() -> Self {
        Self {
            delay_time_ms: 500,
            feedback_gain: 0.4,
            sync_enabled: false,
            sync_division: SyncDivision::Quarter,
            tempo_bpm: None,
        }
    }
}

impl DelayParameters {
    /// Delay time clamped into the supported millisecond range.
    pub fn clamped_delay_time_ms(&self) -> u32 {
        self.delay_time_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS)
    }

    /// Feedback gain clamped into `[0, MAX_FEEDBACK]`. NaN is treated as
    /// no feedback.
    pub fn clamped_feedback_gain(&self) -> f32 {
        if self.feedback_gain.is_nan() {
            0.0
        } else {
            self.feedback_gain.clamp(0.0, MAX_FEEDBACK)
        }
    }

    /// The tempo to sync against, or `None` when the delay should use the
    /// absolute time: sync is off, the host has no transport, or the
    /// reported tempo is not a usable positive number.
    pub fn sync_tempo(&self) -> Option<f64> {
        if !self.sync_enabled {
            return None;
        }

        self.tempo_bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_time_is_clamped() {
        let mut params = DelayParameters {
            delay_time_ms: 0,
            ..Default::default()
        };
        assert_eq!(params.clamped_delay_time_ms(), 1);

        params.delay_time_ms = 5000;
        assert_eq!(params.clamped_delay_time_ms(), 2000);

        params.delay_time_ms = 750;
        assert_eq!(params.clamped_delay_time_ms(), 750);
    }

    #[test]
    fn test_feedback_is_clamped() {
        let mut params = DelayParameters {
            feedback_gain: 1.5,
            ..Default::default()
        };
        assert_eq!(params.clamped_feedback_gain(), 1.0);

        params.feedback_gain = -0.2;
        assert_eq!(params.clamped_feedback_gain(), 0.0);

        params.feedback_gain = f32::NAN;
        assert_eq!(params.clamped_feedback_gain(), 0.0);
    }

    #[test]
    fn test_sync_tempo_requires_sync_and_valid_tempo() {
        let mut params = DelayParameters {
            tempo_bpm: Some(120.0),
            ..Default::default()
        };
        assert_eq!(params.sync_tempo(), None, "sync is disabled");

        params.sync_enabled = true;
        assert_eq!(params.sync_tempo(), Some(120.0));

        params.tempo_bpm = None;
        assert_eq!(params.sync_tempo(), None, "no transport");

        params.tempo_bpm = Some(0.0);
        assert_eq!(params.sync_tempo(), None, "zero tempo");

        params.tempo_bpm = Some(f64::INFINITY);
        assert_eq!(params.sync_tempo(), None, "infinite tempo");
    }
}
