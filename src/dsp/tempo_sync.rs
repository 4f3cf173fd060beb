//! # Tempo Sync
//!
//! Converts a musical note length into a delay time in samples, so the
//! echoes land on the song's grid instead of at an arbitrary number of
//! milliseconds.
//!
//! ## The Math
//!
//! At `bpm` beats per minute, one quarter note (one beat) lasts
//! `60 / bpm` seconds, or in samples:
//!
//! ```text
//! quarter_note_samples = sample_rate * 60 / bpm
//! ```
//!
//! Every other division is expressed as a divisor against that quarter
//! note. An eighth note is half as long (divisor 2), a whole note four
//! times as long (divisor 1/4):
//!
//! ```text
//! 120 BPM @ 44100 Hz:
//!   1/4  -> 44100 * 60 / 120     = 22050 samples
//!   1/8  -> 22050 / 2            = 11025 samples
//!   1/16 -> 22050 / 4            =  5512.5 -> 5513 samples
//! ```
//!
//! Results are rounded half away from zero so that sweeping the tempo up
//! and back down lands on the same sample counts.

use nih_plug::prelude::Enum;

/// A note length the delay time can lock to.
///
/// The triplet-ish entries (1/12, 1/6, 1/3) are three notes in the space
/// of two of the next-longer straight value.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyncDivision {
    #[id = "1/16"]
    #[name = "1/16"]
    Sixteenth,
    #[id = "1/12"]
    #[name = "1/12"]
    Twelfth,
    #[id = "1/8"]
    #[name = "1/8"]
    Eighth,
    #[id = "1/6"]
    #[name = "1/6"]
    Sixth,
    #[id = "1/4"]
    #[name = "1/4"]
    Quarter,
    #[id = "1/3"]
    #[name = "1/3"]
    Third,
    #[id = "1/2"]
    #[name = "1/2"]
    Half,
    #[id = "1/1"]
    #[name = "1/1"]
    Whole,
}

/// Divisor of each [`SyncDivision`] relative to a quarter note, indexed by
/// the enum's discriminant.
const QUARTER_NOTE_DIVISORS: [f64; 8] = [
    4.0,  // 1/16
    3.0,  // 1/12
    2.0,  // 1/8
    1.5,  // 1/6
    1.0,  // 1/4
    0.75, // 1/3
    0.5,  // 1/2
    0.25, // 1/1
];

impl SyncDivision {
    pub const ALL: [SyncDivision; 8] = [
        SyncDivision::Sixteenth,
        SyncDivision::Twelfth,
        SyncDivision::Eighth,
        SyncDivision::Sixth,
        SyncDivision::Quarter,
        SyncDivision::Third,
        SyncDivision::Half,
        SyncDivision::Whole,
    ];

    /// How many of this note fit in one quarter note.
    pub fn quarter_note_divisor(self) -> f64 {
        QUARTER_NOTE_DIVISORS[self as usize]
    }
}

/// Resolve `division` at `tempo_bpm` into a delay length in samples.
///
/// The result is clamped to `[1, capacity - 1]` so it can always be used
/// as a read offset into a buffer of `capacity` samples. Callers are
/// expected to only invoke this with a usable (positive, finite) tempo;
/// when the host has no transport, fall back to the absolute delay time
/// instead.
pub fn resolve(tempo_bpm: f64, division: SyncDivision, sample_rate: f32, capacity: usize) -> usize {
    let quarter_note_samples = f64::from(sample_rate) * 60.0 / tempo_bpm;
    // `f64::round()` rounds half away from zero. The float-to-int cast
    // saturates, so an absurdly slow tempo still ends up in the clamp.
    let samples = (quarter_note_samples / division.quarter_note_divisor()).round() as usize;

    samples.clamp(1, capacity.saturating_sub(1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIG: usize = 1 << 24;

    #[test]
    fn test_quarter_and_eighth_at_120_bpm() {
        assert_eq!(resolve(120.0, SyncDivision::Quarter, 44100.0, BIG), 22050);
        assert_eq!(resolve(120.0, SyncDivision::Eighth, 44100.0, BIG), 11025);
    }

    #[test]
    fn test_every_division_at_120_bpm() {
        let expected = [5513, 7350, 11025, 14700, 22050, 29400, 44100, 88200];
        for (division, want) in SyncDivision::ALL.into_iter().zip(expected) {
            assert_eq!(
                resolve(120.0, division, 44100.0, BIG),
                want,
                "wrong length for {division:?}"
            );
        }
    }

    /// 5512.5 samples must round up, not truncate.
    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(resolve(120.0, SyncDivision::Sixteenth, 44100.0, BIG), 5513);
    }

    #[test]
    fn test_faster_tempo_gives_shorter_delay() {
        let slow = resolve(90.0, SyncDivision::Quarter, 48000.0, BIG);
        let fast = resolve(180.0, SyncDivision::Quarter, 48000.0, BIG);
        assert_eq!(slow, 32000);
        assert_eq!(fast, 16000);
    }

    #[test]
    fn test_clamps_to_capacity() {
        // A whole note at 20 BPM is 12 seconds, far beyond this buffer.
        assert_eq!(resolve(20.0, SyncDivision::Whole, 44100.0, 1000), 999);
    }

    #[test]
    fn test_never_resolves_to_zero() {
        assert_eq!(resolve(1.0e9, SyncDivision::Sixteenth, 44100.0, BIG), 1);
    }

    #[test]
    fn test_divisor_table_matches_variants() {
        assert_eq!(SyncDivision::Sixteenth.quarter_note_divisor(), 4.0);
        assert_eq!(SyncDivision::Quarter.quarter_note_divisor(), 1.0);
        assert_eq!(SyncDivision::Whole.quarter_note_divisor(), 0.25);
    }
}
