//! Beat/second arithmetic and grid quantization.
//!
//! All conversions go through a tempo in quarter-note beats per minute.
//! Quantization snaps a continuous time to the nearest point on a fixed
//! beat grid; rounding is half-up, so a time exactly between two grid
//! points lands on the later one.

use crate::error::{ConvertError, Result};

/// Convert a duration in beats to seconds at the given tempo.
pub fn beats_to_seconds(beats: f64, tempo: f64) -> Result<f64> {
    validate_tempo(tempo)?;
    Ok(beats * 60.0 / tempo)
}

/// Convert a duration in seconds to beats at the given tempo.
pub fn seconds_to_beats(seconds: f64, tempo: f64) -> Result<f64> {
    validate_tempo(tempo)?;
    Ok(seconds * tempo / 60.0)
}

/// Duration of one full measure in beats, from the time signature.
/// Quarter-note units: 4/4 → 4 beats, 3/4 → 3, 6/8 → 3, 2/2 → 4.
pub fn measure_beats(numerator: u32, denominator: u32) -> f64 {
    numerator as f64 * 4.0 / denominator as f64
}

/// Snap a time in seconds to the nearest multiple of `resolution` beats.
///
/// The value is converted to beats, rounded half-up to the grid, and
/// converted back. Quantizing an already-quantized time is a no-op.
pub fn quantize_time(seconds: f64, resolution: f64, tempo: f64) -> Result<f64> {
    let beats = seconds_to_beats(seconds, tempo)?;
    let quantized_beats = (beats / resolution).round() * resolution;
    beats_to_seconds(quantized_beats, tempo)
}

/// Quantized duration in beats between two times.
///
/// Both endpoints are quantized independently, then differenced. The
/// result never drops below one grid step, so a very short note keeps a
/// playable duration instead of collapsing to zero.
pub fn quantized_duration(
    start: f64,
    end: f64,
    tempo: f64,
    resolution: f64,
) -> Result<f64> {
    let q_start = quantize_time(start, resolution, tempo)?;
    let q_end = quantize_time(end, resolution, tempo)?;
    let beats = seconds_to_beats(q_end - q_start, tempo)?;
    Ok(beats.max(resolution))
}

fn validate_tempo(tempo: f64) -> Result<()> {
    if !tempo.is_finite() || tempo <= 0.0 {
        return Err(ConvertError::InvalidTempo(tempo));
    }
    Ok(())
}
