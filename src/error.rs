//! Errors raised while preparing the delay line.
//!
//! Only `prepare()` can fail. Once a delay line is prepared, the audio
//! path never returns errors: out-of-range settings are clamped and a
//! missing tempo falls back to the absolute delay time.

use thiserror::Error;

/// Why a [`DelayLine`](crate::dsp::delay_line::DelayLine) could not be
/// prepared for the configuration the host asked for.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrepareError {
    #[error("channel count must be at least 1")]
    NoChannels,

    #[error("maximum block size must be at least 1 sample")]
    EmptyBlock,

    #[error("sample rate must be a positive, finite number of Hz (got {0})")]
    InvalidSampleRate(f32),

    #[error("delay buffer of 2 x ({sample_rate} + {max_block_size}) samples does not fit in memory")]
    CapacityOverflow {
        sample_rate: usize,
        max_block_size: usize,
    },
}
