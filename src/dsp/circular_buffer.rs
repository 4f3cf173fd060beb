//! # Circular Audio Buffer
//!
//! A fixed-capacity, multi-channel sample store. Unlike the per-sample
//! ring buffer of the first Loveless Delay, this one moves whole audio
//! blocks at a time: the host hands us 64-1024 samples per callback and
//! we copy them in and out of storage in one go.
//!
//! ## Wrapping a Block
//!
//! A block rarely lines up with the end of storage. When a copy starting
//! at `start` would run past `capacity`, it is split into two contiguous
//! sub-copies:
//!
//! ```text
//!  capacity = 12, start = 9, len = 5
//!
//!  storage:  [ 0  1  2  3  4  5  6  7  8  9 10 11 ]
//!              ^^^^^                     ^^^^^^^^
//!              second: 0..2              first: 9..12
//! ```
//!
//! Because the delay line sizes its storage to at least twice the
//! longest delay plus a block, a single copy never wraps more than once,
//! so two segments are always enough.
//!
//! ## Gain Ramps
//!
//! Writes and adds carry a linear gain ramp from `start_gain` to
//! `end_gain`. Sample `i` of an `n`-sample copy is scaled by
//!
//! ```text
//! gain_i = start_gain + (end_gain - start_gain) * i / n
//! ```
//!
//! The second segment of a wrapped copy continues at `i = first_len`, so
//! the ramp has no seam at the wrap point.

use std::ops::Range;

/// Multi-channel circular sample storage.
///
/// Storage is allocated once in [`new()`](Self::new) and never resized.
/// None of the read/write methods allocate.
pub struct CircularAudioBuffer {
    /// One contiguous `Vec<f32>` of length `capacity` per channel.
    channels: Vec<Vec<f32>>,
    capacity: usize,
}

impl CircularAudioBuffer {
    /// Allocate `channel_count` channels of `capacity` samples of silence.
    ///
    /// # Panics
    /// If `capacity` is zero. Wrapping arithmetic is undefined on an empty
    /// ring.
    pub fn new(channel_count: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "circular buffer capacity must be non-zero");

        Self {
            channels: vec![vec![0.0; capacity]; channel_count],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Fill every channel with silence.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Overwrite `source.len()` samples starting at `start_offset`
    /// (reduced modulo capacity), scaling by a linear gain ramp.
    ///
    /// # Panics
    /// If `source` is longer than the capacity or `channel` is out of range.
    pub fn write_with_gain_ramp(
        &mut self,
        channel: usize,
        start_offset: usize,
        source: &[f32],
        start_gain: f32,
        end_gain: f32,
    ) {
        self.apply_with_gain_ramp(
            channel,
            start_offset,
            source,
            start_gain,
            end_gain,
            |slot, value| *slot = value,
        );
    }

    /// Like [`write_with_gain_ramp()`](Self::write_with_gain_ramp), but
    /// accumulates into what is already stored. This is how feedback
    /// energy gets combined with the freshly written input.
    pub fn add_with_gain_ramp(
        &mut self,
        channel: usize,
        start_offset: usize,
        source: &[f32],
        start_gain: f32,
        end_gain: f32,
    ) {
        self.apply_with_gain_ramp(
            channel,
            start_offset,
            source,
            start_gain,
            end_gain,
            |slot, value| *slot += value,
        );
    }

    /// Copy `len` samples starting at `source_start` (reduced modulo
    /// capacity) into `destination[dest_start..dest_start + len]`.
    ///
    /// # Panics
    /// If `len` exceeds the capacity, `channel` is out of range, or the
    /// destination range does not fit in `destination`.
    pub fn read_into(
        &self,
        destination: &mut [f32],
        channel: usize,
        dest_start: usize,
        source_start: usize,
        len: usize,
    ) {
        assert!(
            len <= self.capacity,
            "read of {len} samples exceeds buffer capacity {}",
            self.capacity
        );
        let storage = self.channel(channel);
        let (first, second) = self.segments(source_start, len);
        let first_len = first.len();

        let destination = &mut destination[dest_start..dest_start + len];
        destination[..first_len].copy_from_slice(&storage[first]);
        destination[first_len..].copy_from_slice(&storage[second]);
    }

    /// Shared addressing for writes and adds. `combine` receives the
    /// storage slot and the gain-scaled source sample.
    fn apply_with_gain_ramp(
        &mut self,
        channel: usize,
        start_offset: usize,
        source: &[f32],
        start_gain: f32,
        end_gain: f32,
        combine: impl Fn(&mut f32, f32),
    ) {
        let len = source.len();
        assert!(
            len <= self.capacity,
            "write of {len} samples exceeds buffer capacity {}",
            self.capacity
        );
        let (first, second) = self.segments(start_offset, len);
        let first_len = first.len();
        let ramp = GainRamp::new(start_gain, end_gain, len);

        let storage = self.channel_mut(channel);
        for (i, (slot, &sample)) in storage[first].iter_mut().zip(source).enumerate() {
            combine(slot, sample * ramp.at(i));
        }
        for (i, (slot, &sample)) in storage[second]
            .iter_mut()
            .zip(&source[first_len..])
            .enumerate()
        {
            combine(slot, sample * ramp.at(first_len + i));
        }
    }

    /// Split a `len`-sample span starting at `start_offset` into the part
    /// before the end of storage and the part wrapped to the front. The
    /// second range is empty when no wrap happens.
    fn segments(&self, start_offset: usize, len: usize) -> (Range<usize>, Range<usize>) {
        let start = start_offset % self.capacity;
        let first_len = len.min(self.capacity - start);

        (start..start + first_len, 0..len - first_len)
    }

    fn channel(&self, channel: usize) -> &[f32] {
        assert!(
            channel < self.channels.len(),
            "channel {channel} out of range for {} channels",
            self.channels.len()
        );
        &self.channels[channel]
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        assert!(
            channel < self.channels.len(),
            "channel {channel} out of range for {} channels",
            self.channels.len()
        );
        &mut self.channels[channel]
    }
}

/// A linear gain ramp over `len` samples.
#[derive(Clone, Copy)]
struct GainRamp {
    start: f32,
    step: f32,
    constant: bool,
}

impl GainRamp {
    fn new(start: f32, end: f32, len: usize) -> Self {
        let constant = start == end || len == 0;
        let step = if constant {
            0.0
        } else {
            (end - start) / len as f32
        };

        Self {
            start,
            step,
            constant,
        }
    }

    #[inline]
    fn at(self, index: usize) -> f32 {
        if self.constant {
            self.start
        } else {
            self.start + self.step * index as f32
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i + 1) as f32 * 0.1).collect()
    }

    #[test]
    fn test_new_buffer_is_silent() {
        let buf = CircularAudioBuffer::new(2, 16);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.channel_count(), 2);

        let mut out = [1.0; 16];
        buf.read_into(&mut out, 1, 0, 0, 16);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    /// Writing across the end of storage and reading the same span back
    /// must reproduce the source exactly.
    #[test]
    fn test_wrap_round_trip_is_bit_exact() {
        let mut buf = CircularAudioBuffer::new(1, 32);
        let source = ramp(10);
        let start = buf.capacity() - 3;

        buf.write_with_gain_ramp(0, start, &source, 1.0, 1.0);

        let mut out = [0.0; 10];
        buf.read_into(&mut out, 0, 0, start, 10);
        assert_eq!(out.as_slice(), source.as_slice());
    }

    #[test]
    fn test_wrapped_write_lands_at_front() {
        let mut buf = CircularAudioBuffer::new(1, 8);
        buf.write_with_gain_ramp(0, 6, &[1.0, 2.0, 3.0, 4.0], 1.0, 1.0);

        let mut whole = [0.0; 8];
        buf.read_into(&mut whole, 0, 0, 0, 8);
        assert_eq!(whole, [3.0, 4.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_offsets_are_reduced_modulo_capacity() {
        let mut buf = CircularAudioBuffer::new(1, 8);
        buf.write_with_gain_ramp(0, 8 * 3 + 2, &[0.5], 1.0, 1.0);

        let mut out = [0.0; 1];
        buf.read_into(&mut out, 0, 0, 2, 1);
        assert_eq!(out[0], 0.5);

        buf.read_into(&mut out, 0, 0, 8 + 2, 1);
        assert_eq!(out[0], 0.5);
    }

    #[test]
    fn test_constant_gain_scales_every_sample() {
        let mut buf = CircularAudioBuffer::new(1, 8);
        buf.write_with_gain_ramp(0, 0, &[1.0, -1.0, 0.5], 0.8, 0.8);

        let mut out = [0.0; 3];
        buf.read_into(&mut out, 0, 0, 0, 3);
        assert_abs_diff_eq!(out[0], 0.8);
        assert_abs_diff_eq!(out[1], -0.8);
        assert_abs_diff_eq!(out[2], 0.4);
    }

    /// The ramp must continue through the wrap point instead of restarting
    /// at `start_gain` for the second segment.
    #[test]
    fn test_gain_ramp_is_continuous_across_wrap() {
        let mut buf = CircularAudioBuffer::new(1, 8);
        let ones = [1.0; 4];
        buf.write_with_gain_ramp(0, 6, &ones, 0.0, 1.0);

        let mut out = [0.0; 4];
        buf.read_into(&mut out, 0, 0, 6, 4);
        for (i, &sample) in out.iter().enumerate() {
            assert_abs_diff_eq!(sample, i as f32 * 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_add_accumulates_into_existing_content() {
        let mut buf = CircularAudioBuffer::new(1, 8);
        buf.write_with_gain_ramp(0, 7, &[1.0, 1.0], 0.8, 0.8);
        buf.add_with_gain_ramp(0, 7, &[1.0, 2.0], 0.5, 0.5);

        let mut out = [0.0; 2];
        buf.read_into(&mut out, 0, 0, 7, 2);
        assert_abs_diff_eq!(out[0], 1.3, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 1.8, epsilon = 1e-6);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut buf = CircularAudioBuffer::new(2, 4);
        buf.write_with_gain_ramp(1, 0, &[0.25; 4], 1.0, 1.0);

        let mut left = [1.0; 4];
        let mut right = [0.0; 4];
        buf.read_into(&mut left, 0, 0, 0, 4);
        buf.read_into(&mut right, 1, 0, 0, 4);
        assert_eq!(left, [0.0; 4]);
        assert_eq!(right, [0.25; 4]);
    }

    #[test]
    fn test_read_into_respects_destination_offset() {
        let mut buf = CircularAudioBuffer::new(1, 4);
        buf.write_with_gain_ramp(0, 0, &[1.0, 2.0, 3.0, 4.0], 1.0, 1.0);

        let mut out = [0.0; 5];
        buf.read_into(&mut out, 0, 2, 3, 3);
        assert_eq!(out, [0.0, 0.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_clear_silences_all_channels() {
        let mut buf = CircularAudioBuffer::new(2, 4);
        buf.write_with_gain_ramp(0, 0, &[1.0; 4], 1.0, 1.0);
        buf.write_with_gain_ramp(1, 0, &[1.0; 4], 1.0, 1.0);
        buf.clear();

        let mut out = [1.0; 4];
        for channel in 0..2 {
            buf.read_into(&mut out, channel, 0, 0, 4);
            assert_eq!(out, [0.0; 4]);
        }
    }

    #[test]
    #[should_panic(expected = "exceeds buffer capacity")]
    fn test_oversized_write_panics() {
        let mut buf = CircularAudioBuffer::new(1, 4);
        buf.write_with_gain_ramp(0, 0, &[0.0; 5], 1.0, 1.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bad_channel_panics() {
        let buf = CircularAudioBuffer::new(1, 4);
        let mut out = [0.0; 2];
        buf.read_into(&mut out, 1, 0, 0, 2);
    }
}
