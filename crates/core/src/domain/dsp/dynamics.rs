//! Dynamics: envelope-following compressor and peak limiter
//!
//! The compressor's attack and release are per-sample smoothing
//! coefficients, so its timing does not scale with the sample rate.
//! Gain is computed once per frame from the loudest channel and applied
//! to every channel, which keeps the stereo image stable.

use crate::domain::audio::{AudioBuffer, Result};
use crate::domain::dsp::{Effect, RenderContext};
use tracing::trace;

/// Linear threshold above which gain reduction starts
pub const THRESHOLD: f32 = 0.5;
/// Smoothing coefficient while gain is falling
pub const ATTACK: f32 = 0.01;
/// Smoothing coefficient while gain is recovering, and envelope decay
pub const RELEASE: f32 = 0.1;
/// Extra margin applied when the limiter engages
pub const LIMITER_HEADROOM: f32 = 0.95;

/// Running values threaded through the compressor loop
///
/// Every render starts from silence (envelope 0) at unity gain. The
/// first frame passes through at that state; stepping starts at frame 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeState {
    pub envelope: f32,
    pub gain: f32,
}

impl Default for EnvelopeState {
    fn default() -> Self {
        Self {
            envelope: 0.0,
            gain: 1.0,
        }
    }
}

impl EnvelopeState {
    /// Advance one frame given its peak level; returns the gain to apply
    #[inline]
    pub fn step(&mut self, peak: f32, compressor: &Compressor) -> f32 {
        self.envelope = peak.max(self.envelope * (1.0 - compressor.release));

        let target = compressor.target_gain(self.envelope);

        // Use attack coefficient for falling gain, release for rising
        let coeff = if target < self.gain {
            compressor.attack
        } else {
            compressor.release
        };
        self.gain += coeff * (target - self.gain);
        self.gain
    }
}

/// Feed-forward compressor driven by a single `amount` control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compressor {
    amount: f32,
    threshold: f32,
    ratio: f32,
    attack: f32,
    release: f32,
}

impl Compressor {
    /// `amount` in 0..1 maps to a ratio of 1:1..5:1
    pub fn new(amount: f32) -> Self {
        Self {
            amount,
            threshold: THRESHOLD,
            ratio: 1.0 + amount * 4.0,
            attack: ATTACK,
            release: RELEASE,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Static gain curve for a given envelope level
    #[inline]
    fn target_gain(&self, envelope: f32) -> f32 {
        if envelope > self.threshold {
            (self.threshold + (envelope - self.threshold) / self.ratio) / envelope
        } else {
            1.0
        }
    }

    /// Compress `buffer` in place
    pub fn apply(&self, buffer: &mut AudioBuffer) {
        if self.amount <= 0.0 {
            return;
        }

        let mut state = EnvelopeState::default();
        let frames = buffer.num_frames();
        let gains: Vec<f32> = std::iter::once(state.gain)
            .chain((1..frames).map(|i| state.step(buffer.frame_peak(i), self)))
            .take(frames)
            .collect();

        for channel in buffer.channels_mut() {
            for (sample, gain) in channel.iter_mut().zip(&gains) {
                *sample *= gain;
            }
        }

        trace!(
            "Compressor: ratio={:.2}, final gain={:.3}",
            self.ratio,
            state.gain
        );
    }
}

impl Effect for Compressor {
    fn process(&self, mut buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "compression"
    }
}

/// Compress with the settings derived from `amount`
pub fn compress(buffer: &mut AudioBuffer, amount: f32) {
    Compressor::new(amount).apply(buffer);
}

/// Single-shot peak limiter
///
/// Scales the whole buffer once if its peak exceeds the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limiter {
    ceiling: f32,
}

impl Limiter {
    pub fn new(ceiling: f32) -> Self {
        Self { ceiling }
    }

    /// Limit `buffer` in place
    pub fn apply(&self, buffer: &mut AudioBuffer) {
        if self.ceiling <= 0.0 {
            return;
        }

        let peak = buffer.peak();
        if peak <= self.ceiling {
            return;
        }

        let gain = (self.ceiling / peak) * LIMITER_HEADROOM;
        trace!("Limiter: peak={:.3}, gain={:.3}", peak, gain);
        buffer.map_samples(|s| s * gain);
    }
}

impl Effect for Limiter {
    fn process(&self, mut buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.ceiling <= 0.0
    }

    fn name(&self) -> &str {
        "limiter"
    }
}

/// Limit to `ceiling` (linear amplitude)
pub fn limit(buffer: &mut AudioBuffer, ceiling: f32) {
    Limiter::new(ceiling).apply(buffer);
}
