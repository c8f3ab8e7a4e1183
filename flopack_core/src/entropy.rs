//! Histogram-based compressibility estimate for a single byte plane.
//!
//! The score is advisory: the pipeline records it alongside each plane's
//! layout but never lets it override a lossy-policy decision.

/// At most this many bytes are sampled per plane.
pub const SAMPLE_CAP: usize = 10_000;

/// Minimum share (percent) of the most frequent byte for a non-zero score.
pub const LOW_THRESHOLD: usize = 1;

/// Share (percent) at or above which a plane scores the maximum.
pub const HIGH_THRESHOLD: usize = 9;

/// Highest score `classify` returns.
pub const MAX_SCORE: u8 = 9;

/// Score a plane in `[0, 9]` from the frequency of its most common byte.
///
/// Planes longer than [`SAMPLE_CAP`] are sampled at evenly spaced positions.
/// A plane whose most common byte makes up less than [`LOW_THRESHOLD`]
/// percent of the sample scores 0.
pub fn classify(plane: &[u8]) -> u8 {
    if plane.is_empty() {
        return 0;
    }
    let (step, samples) = if plane.len() > SAMPLE_CAP {
        (plane.len() / SAMPLE_CAP, SAMPLE_CAP)
    } else {
        (1, plane.len())
    };

    let mut histogram = [0usize; 256];
    for &b in plane.iter().step_by(step).take(samples) {
        histogram[b as usize] += 1;
    }

    let peak = histogram.iter().copied().max().unwrap_or(0);
    let peak_percent = peak * 100 / samples;

    if peak_percent < LOW_THRESHOLD {
        0
    } else if peak_percent >= HIGH_THRESHOLD {
        MAX_SCORE
    } else {
        (HIGH_THRESHOLD - peak_percent) as u8
    }
}
