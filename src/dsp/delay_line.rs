//! # Block-Based Feedback Delay Line
//!
//! The delay line owns a [`CircularAudioBuffer`] and a single write
//! cursor. Each audio block goes through the same steps:
//!
//! ```text
//!            ┌────────────── circular buffer ──────────────┐
//!   input ──►│ 1. fill at write_pos (× 0.8)                │
//!            │                                             │
//!            │ 2-3. read_pos = write_pos - delay           │
//!   wet  ◄───│ 4. read back block from read_pos            │
//!            │                                             │
//!            │ 5. add tap × feedback at write_pos          │
//!            └─────────────────────────────────────────────┘
//!   6. write_pos = (write_pos + block_len) % capacity
//! ```
//!
//! The delay line only emits the wet (delayed) signal. Blending it with
//! the dry input is the plugin's job.
//!
//! ## Buffer Sizing
//!
//! `prepare()` allocates `2 × (sample_rate + max_block_size)` samples per
//! channel. The longest absolute delay (2000 ms) is `2 × sample_rate`
//! samples, so the longest delay plus a full block always fits, and no
//! copy ever wraps more than once.
//!
//! ## Feedback Tap
//!
//! The fill step overwrites the slot at the write cursor every pass. To
//! get echoes of echoes, step 5 reinjects the *delayed* signal by
//! default, which makes the output follow
//!
//! ```text
//! y[n] = 0.8 · x[n - D] + g · y[n - D]
//! ```
//!
//! so each repeat is `g` times the previous one. [`FeedbackTap::Dry`]
//! reinjects the dry input instead, which only raises the level of the
//! single echo to `0.8 + g`.
//!
//! When the delay is shorter than the block, the block is processed in
//! sub-blocks no longer than the delay. Every read then only sees samples
//! whose feedback has already been added, and the recursion above holds
//! sample for sample.

use super::circular_buffer::CircularAudioBuffer;
use super::parameters::DelayParameters;
use super::tempo_sync;
use crate::error::PrepareError;

/// Constant gain applied to the input as it is written into the buffer.
pub const INPUT_GAIN: f32 = 0.8;

/// Which signal is fed back into the buffer at the write cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackTap {
    /// The delayed signal that was just read back. Produces repeats that
    /// decay geometrically by the feedback gain.
    #[default]
    Delayed,
    /// The original dry input.
    Dry,
}

/// Convert an absolute delay time to whole samples, rounding half away
/// from zero.
///
/// At 44100 Hz: 100 ms = 4410 samples, 2000 ms = 88200 samples.
pub fn delay_ms_to_samples(delay_ms: u32, sample_rate: f32) -> usize {
    (f64::from(sample_rate) * f64::from(delay_ms) / 1000.0).round() as usize
}

/// Storage that only exists once the host has told us the sample rate,
/// channel count and maximum block size.
struct Prepared {
    buffer: CircularAudioBuffer,
    /// Copy of one channel's dry sub-block, for [`FeedbackTap::Dry`].
    scratch: Vec<f32>,
    sample_rate: f32,
    max_block_size: usize,
}

/// A multi-channel feedback delay line.
///
/// Starts out unprepared. [`prepare()`](Self::prepare) must be called
/// (outside the audio thread) before [`process_block()`](Self::process_block),
/// and again whenever the sample rate, channel count or maximum block
/// size changes.
pub struct DelayLine {
    state: Option<Prepared>,
    /// Next slot to be written, always in `[0, capacity)`.
    write_position: usize,
    feedback_tap: FeedbackTap,
    /// Feedback gain used by the previous block, so a change can be ramped
    /// across the next one. `None` right after preparation.
    previous_feedback: Option<f32>,
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayLine {
    pub fn new() -> Self {
        Self {
            state: None,
            write_position: 0,
            feedback_tap: FeedbackTap::default(),
            previous_feedback: None,
        }
    }

    /// Select which signal is reinjected by the feedback loop.
    pub fn with_feedback_tap(mut self, feedback_tap: FeedbackTap) -> Self {
        self.feedback_tap = feedback_tap;
        self
    }

    /// Allocate the delay buffer for the given audio configuration,
    /// clear it to silence and move the write cursor back to zero.
    ///
    /// This allocates and must never be called from the audio thread.
    pub fn prepare(
        &mut self,
        channel_count: usize,
        sample_rate: f32,
        max_block_size: usize,
    ) -> Result<(), PrepareError> {
        if channel_count == 0 {
            return Err(PrepareError::NoChannels);
        }
        if max_block_size == 0 {
            return Err(PrepareError::EmptyBlock);
        }
        if !sample_rate.is_finite() || sample_rate < 1.0 {
            return Err(PrepareError::InvalidSampleRate(sample_rate));
        }

        let rate_samples = sample_rate.round() as usize;
        let capacity = rate_samples
            .checked_add(max_block_size)
            .and_then(|n| n.checked_mul(2))
            .ok_or(PrepareError::CapacityOverflow {
                sample_rate: rate_samples,
                max_block_size,
            })?;

        self.state = Some(Prepared {
            buffer: CircularAudioBuffer::new(channel_count, capacity),
            scratch: vec![0.0; max_block_size],
            sample_rate,
            max_block_size,
        });
        self.write_position = 0;
        self.previous_feedback = None;

        Ok(())
    }

    /// Size of the delay buffer in samples per channel, or 0 before
    /// `prepare()`. For display and diagnostics only.
    pub fn capacity(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.buffer.capacity())
    }

    pub fn write_position(&self) -> usize {
        self.write_position
    }

    /// Silence the buffer and rewind the write cursor without
    /// reallocating. Safe to call from the audio thread.
    pub fn clear(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.buffer.clear();
        }
        self.write_position = 0;
        self.previous_feedback = None;
    }

    /// The delay, in samples, that a block of `block_len` samples would be
    /// processed with. Returns 0 before `prepare()`.
    pub fn delay_samples(&self, params: &DelayParameters, block_len: usize) -> usize {
        self.state
            .as_ref()
            .map_or(0, |s| s.delay_samples(params, block_len))
    }

    /// Process one block in place: `block` holds the dry input on entry
    /// and the delayed (wet) signal on return.
    ///
    /// `block` has one slice per channel, all the same length. Calling this
    /// before `prepare()`, with a block longer than the prepared maximum or
    /// with more channels than were prepared is a bug in the caller and
    /// fails a debug assertion. Release builds output silence for an
    /// unprepared delay line or an unprepared channel, and split oversized
    /// blocks.
    pub fn process_block(&mut self, block: &mut [&mut [f32]], params: &DelayParameters) {
        let Some(state) = self.state.as_mut() else {
            debug_assert!(false, "DelayLine::process_block() called before prepare()");
            for channel in block.iter_mut() {
                channel.fill(0.0);
            }
            return;
        };

        let block_len = block.first().map_or(0, |channel| channel.len());
        if block_len == 0 {
            return;
        }
        debug_assert!(
            block_len <= state.max_block_size,
            "block of {block_len} samples exceeds prepared maximum of {}",
            state.max_block_size
        );
        debug_assert!(
            block.iter().all(|channel| channel.len() == block_len),
            "all channels of a block must have the same length"
        );
        debug_assert!(
            block.len() <= state.buffer.channel_count(),
            "block has {} channels but the delay line was prepared for {}",
            block.len(),
            state.buffer.channel_count()
        );
        for channel in block.iter_mut().skip(state.buffer.channel_count()) {
            channel.fill(0.0);
        }

        let capacity = state.buffer.capacity();
        let delay = state.delay_samples(params, block_len);
        let feedback = params.clamped_feedback_gain();
        let previous_feedback = self.previous_feedback.replace(feedback).unwrap_or(feedback);

        // With no delay the read sees this block's own fill, which is
        // already complete before the read, so no splitting is needed.
        let max_chunk = match delay {
            0 => state.max_block_size,
            delay => delay.min(state.max_block_size),
        };
        let feedback_at = |offset: usize| {
            let t = offset as f32 / block_len as f32;
            previous_feedback + (feedback - previous_feedback) * t
        };

        let mut offset = 0;
        while offset < block_len {
            let len = (block_len - offset).min(max_chunk);
            state.process_chunk(
                block,
                offset..offset + len,
                self.write_position,
                delay,
                self.feedback_tap,
                (feedback_at(offset), feedback_at(offset + len)),
            );

            self.write_position = (self.write_position + len) % capacity;
            offset += len;
        }
    }
}

impl Prepared {
    fn delay_samples(&self, params: &DelayParameters, block_len: usize) -> usize {
        let capacity = self.buffer.capacity();
        let delay = match params.sync_tempo() {
            Some(tempo_bpm) => tempo_sync::resolve(
                tempo_bpm,
                params.sync_division,
                self.sample_rate,
                capacity,
            ),
            None => delay_ms_to_samples(params.clamped_delay_time_ms(), self.sample_rate),
        };

        // Keep the read span clear of the span being written this block.
        delay.min(capacity.saturating_sub(block_len + 1))
    }

    /// Fill, read back and reinject one sub-block of every channel.
    fn process_chunk(
        &mut self,
        block: &mut [&mut [f32]],
        range: std::ops::Range<usize>,
        write_position: usize,
        delay: usize,
        feedback_tap: FeedbackTap,
        (feedback_start, feedback_end): (f32, f32),
    ) {
        let capacity = self.buffer.capacity();
        let read_position = (capacity + write_position - delay) % capacity;
        let channel_count = self.buffer.channel_count();

        for (channel, samples) in block.iter_mut().take(channel_count).enumerate() {
            let samples = &mut samples[range.clone()];
            let len = samples.len();

            self.buffer
                .write_with_gain_ramp(channel, write_position, samples, INPUT_GAIN, INPUT_GAIN);
            if feedback_tap == FeedbackTap::Dry {
                self.scratch[..len].copy_from_slice(samples);
            }

            self.buffer.read_into(samples, channel, 0, read_position, len);

            let tap: &[f32] = match feedback_tap {
                FeedbackTap::Delayed => samples,
                FeedbackTap::Dry => &self.scratch[..len],
            };
            self.buffer
                .add_with_gain_ramp(channel, write_position, tap, feedback_start, feedback_end);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
