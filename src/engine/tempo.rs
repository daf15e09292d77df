//! Tempo arithmetic
//!
//! Pure helpers shared by the decks, the mixer and the auto-mix planner.

use crate::error::{ensure_finite, MixError, Result};

/// BPM reported when no deck has a track
pub const DEFAULT_BPM: f64 = 120.0;

/// Lowest accepted track BPM
pub const MIN_BPM: f64 = 20.0;

/// Highest accepted track BPM
pub const MAX_BPM: f64 = 300.0;

/// Loop lengths a deck accepts, in beats
pub const LOOP_LENGTHS: [u32; 5] = [1, 2, 4, 8, 16];

/// Pitch ratio that makes a track at `target_bpm` play at `source_bpm`
///
/// The result is unclamped; decks clamp it when it is applied.
pub fn sync_ratio(source_bpm: f64, target_bpm: f64) -> Result<f64> {
    let source = ensure_positive("source_bpm", source_bpm)?;
    let target = ensure_positive("target_bpm", target_bpm)?;
    Ok(source / target)
}

/// Perceived tempo of a deck
#[inline]
pub fn effective_bpm(bpm: f64, pitch_ratio: f64) -> f64 {
    bpm * pitch_ratio
}

/// Mean of the given BPMs, or [`DEFAULT_BPM`] when there are none
pub fn average_bpm<I>(bpms: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = bpms
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), bpm| (sum + bpm, count + 1));
    if count == 0 {
        DEFAULT_BPM
    } else {
        sum / count as f64
    }
}

/// Length of one beat in seconds
#[inline]
pub fn beat_seconds(bpm: f64) -> f64 {
    60.0 / bpm
}

/// Loop span in track seconds
#[inline]
pub fn loop_duration(length_beats: u32, bpm: f64) -> f64 {
    length_beats as f64 * beat_seconds(bpm)
}

/// Loop span as heard, once the pitch ratio is applied
#[inline]
pub fn wall_clock_loop_duration(length_beats: u32, bpm: f64, pitch_ratio: f64) -> f64 {
    loop_duration(length_beats, bpm) / pitch_ratio
}

/// Check a loop length against [`LOOP_LENGTHS`]
pub fn validate_loop_length(length_beats: u32) -> Result<u32> {
    if LOOP_LENGTHS.contains(&length_beats) {
        Ok(length_beats)
    } else {
        Err(MixError::invalid_parameter(
            "loop_length_beats",
            length_beats,
            "one of 1, 2, 4, 8, 16",
        ))
    }
}

fn ensure_positive(param: &str, value: f64) -> Result<f64> {
    let value = ensure_finite(param, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(MixError::invalid_parameter(param, value, "a positive BPM"))
    }
}
