//! Linear-interpolation resampling
//!
//! Used to bring a time-stretched signal back to its original length
//! after pitch shifting. Not band-limited: fine for the small ratios a
//! pitch shift of a couple of octaves needs, audible on large downsampling.

use tracing::trace;

/// Stretch or squeeze `input` to exactly `frames` samples
///
/// Output sample `n` reads `input` at position `n * len / frames`,
/// interpolating linearly between neighbours. Positions past the last
/// input sample hold it.
pub fn resample_to_length(input: &[f32], frames: usize) -> Vec<f32> {
    if input.is_empty() {
        return vec![0.0; frames];
    }
    if frames == input.len() {
        return input.to_vec();
    }

    let last = input.len() - 1;
    let step = input.len() as f64 / frames.max(1) as f64;

    let output: Vec<f32> = (0..frames)
        .map(|n| {
            let position = n as f64 * step;
            let i0 = (position.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let frac = (position - i0 as f64).clamp(0.0, 1.0) as f32;
            input[i0] + frac * (input[i1] - input[i0])
        })
        .collect();

    trace!("Resampled {} -> {} frames", input.len(), frames);
    output
}
