//! # Loveless Delay II — A Tempo-Syncable Block Delay
//!
//! The second Loveless delay, built with
//! [nih-plug](https://github.com/robbert-vdh/nih-plug) and exported as
//! AUv2, VST3 and CLAP. Where the first version processed one sample at a
//! time, this one moves whole host blocks through a circular buffer and
//! can lock its delay time to the host tempo.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬──────────────────────────────────────── × (1 - mix) ──┐
//!         │                                                       │
//!         │   ┌──────────────── DelayLine ────────────────┐       │
//!         └──►│ fill × 0.8 ──► [circular buffer] ──► read │       │
//!             │                     ▲                 │   │       │
//!             │                     └── × feedback ◄──┤   │       │
//!             └───────────────────────────────────────│───┘       │
//!                                                     │           │
//!                                                     └── × mix ─(+)── × output ──► Output
//! ```
//!
//! The delay time comes either from the Delay Time knob or, when Sync is
//! on and the host reports a tempo, from the selected note division.

pub mod dsp;
pub mod error;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::delay_line::DelayLine;
use nih_plug::prelude::*;
use params::PluginParams;

/// Repeats are considered inaudible once they drop below -60 dB.
const TAIL_THRESHOLD: f32 = 0.001;

struct LovelessDelay {
    params: Arc<PluginParams>,

    delay_line: DelayLine,

    /// A copy of each channel's dry input for the current block. The delay
    /// line replaces the block with the wet signal, and the mix stage needs
    /// both. Sized to the host's maximum block in `initialize()`.
    dry: Vec<Vec<f32>>,
}

impl Default for LovelessDelay {
    fn default() -> Self {
        Self {
            params: Arc::new(PluginParams::default()),
            delay_line: DelayLine::new(),
            dry: Vec::new(),
        }
    }
}

impl Plugin for LovelessDelay {
    const NAME: &'static str = "Loveless Delay II";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Delay parameters are snapshotted once per block, so splitting blocks
    // at automation points keeps the snapshot close to the host's intent.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Size the delay buffer for this sample rate, channel count and block
    /// size. Runs off the audio thread, so allocating here is fine.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);
        let max_block_size = buffer_config.max_buffer_size as usize;

        if let Err(err) = self
            .delay_line
            .prepare(num_channels, buffer_config.sample_rate, max_block_size)
        {
            nih_error!("Could not prepare the delay line: {err}");
            return false;
        }

        self.dry = vec![vec![0.0; max_block_size]; num_channels];

        nih_log!(
            "Prepared {num_channels}-channel delay buffer of {} samples at {} Hz",
            self.delay_line.capacity(),
            buffer_config.sample_rate
        );

        true
    }

    /// Drop any ringing echoes when playback stops.
    fn reset(&mut self) {
        self.delay_line.clear();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let num_samples = buffer.samples();

        // Read the delay parameters once for the whole block. The tempo is
        // `None` when the host doesn't report one, which turns sync off.
        let snapshot = self.params.delay_snapshot(context.transport().tempo);

        // Keep the dry input around for the mix stage.
        let channels = buffer.as_slice();
        for (dry, samples) in self.dry.iter_mut().zip(channels.iter()) {
            dry[..num_samples].copy_from_slice(samples);
        }

        // The delay line replaces the block with the wet signal.
        self.delay_line.process_block(channels, &snapshot);

        // Blend dry and wet, then apply the output level. The smoothers
        // advance once per sample, shared by all channels.
        for sample_idx in 0..num_samples {
            let mix = self.params.mix.smoothed.next();
            let gain = self.params.output_gain.smoothed.next();

            for (samples, dry) in channels.iter_mut().zip(&self.dry) {
                let wet = samples[sample_idx];
                samples[sample_idx] = (dry[sample_idx] * (1.0 - mix) + wet * mix) * gain;
            }
        }

        // Tail length. Each repeat is `feedback` times the last, so the
        // echoes reach -60 dB after log(0.001) / log(feedback) repeats.
        let delay_samples = self.delay_line.delay_samples(&snapshot, num_samples) as f32;
        let feedback = snapshot.clamped_feedback_gain();
        // Unity feedback never decays.
        if feedback >= 1.0 {
            return ProcessStatus::KeepAlive;
        }

        let tail_samples = if feedback > TAIL_THRESHOLD {
            let repeats = TAIL_THRESHOLD.log10() / feedback.log10();
            (repeats * delay_samples) as u32
        } else {
            delay_samples as u32
        };

        ProcessStatus::Tail(tail_samples)
    }
}

impl ClapPlugin for LovelessDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-delay-v2";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A block-based feedback delay with tempo sync");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for LovelessDelay {
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssDelay__v002";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

nih_export_clap!(LovelessDelay);
nih_export_vst3!(LovelessDelay);

// AUv2 entry point for Logic Pro, wrapping the CLAP export.
clap_wrapper::export_auv2!();
