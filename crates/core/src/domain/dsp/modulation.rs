//! Wow & flutter: a slow and a fast sinusoidal delay modulation read
//! through a linearly interpolated fractional delay line.

use crate::domain::audio::{AudioBuffer, AudioError, Result, SampleRate};
use crate::domain::dsp::{Effect, RenderContext};
use std::f64::consts::TAU;

/// Slow "wow" rate (Hz)
const WOW_HZ: f64 = 0.5;
/// Fast "flutter" rate (Hz)
const FLUTTER_HZ: f64 = 5.0;
/// Peak wow excursion at amount 1, in seconds
const DEPTH_SECONDS: f64 = 0.003;
/// Flutter depth relative to wow depth
const FLUTTER_RATIO: f64 = 0.3;

/// Per-frame delay offset in samples
pub fn wow_flutter_curve(frames: usize, sample_rate: SampleRate, amount: f32) -> Vec<f64> {
    let sr = f64::from(sample_rate.hz());
    let wow_depth = sr * DEPTH_SECONDS * f64::from(amount);
    let flutter_depth = wow_depth * FLUTTER_RATIO;

    (0..frames)
        .map(|i| {
            let t = i as f64 / sr;
            wow_depth * (TAU * WOW_HZ * t).sin() + flutter_depth * (TAU * FLUTTER_HZ * t).sin()
        })
        .collect()
}

/// Read `buffer` at `i - delay[i]` for every output frame
///
/// Positions at or before the first frame, or at or beyond the last,
/// produce silence.
pub fn fractional_delay(buffer: &AudioBuffer, delay: &[f64]) -> Result<AudioBuffer> {
    let frames = buffer.num_frames();
    if delay.len() != frames {
        return Err(AudioError::LengthMismatch {
            stage: "wow_flutter".to_string(),
            expected: frames,
            actual: delay.len(),
        });
    }

    let max_index = frames.saturating_sub(1) as f64;
    let mut out = vec![vec![0.0_f32; frames]; buffer.num_channels()];

    for (i, &offset) in delay.iter().enumerate() {
        let idx = i as f64 - offset;
        if idx <= 0.0 || idx >= max_index {
            continue;
        }

        let i0 = idx.floor() as usize;
        let frac = (idx - i0 as f64) as f32;
        for (src, dst) in buffer.channels().iter().zip(out.iter_mut()) {
            dst[i] = (1.0 - frac) * src[i0] + frac * src[i0 + 1];
        }
    }

    AudioBuffer::new(out)
}

/// Tape-transport pitch wobble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WowFlutter {
    amount: f32,
}

impl WowFlutter {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }

    pub fn apply(&self, buffer: AudioBuffer, sample_rate: SampleRate) -> Result<AudioBuffer> {
        if self.amount <= 0.0 {
            return Ok(buffer);
        }
        let curve = wow_flutter_curve(buffer.num_frames(), sample_rate, self.amount);
        fractional_delay(&buffer, &curve)
    }
}

impl Effect for WowFlutter {
    fn process(&self, buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(buffer, ctx.sample_rate)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "wow_flutter"
    }
}
