//! Digital Signal Processing stages for the lofi transform
//!
//! This module provides every stage of the render chain:
//! - Biquad shelves and 4th-order Butterworth low/high-pass filters
//! - Envelope-following compressor and peak limiter
//! - Tanh saturation and bitcrusher
//! - Wow & flutter (modulated fractional delay)
//! - Pink noise, crackle and hiss, plus mid/side stereo width
//! - Convolution reverb
//! - Time-stretch and pitch-shift, delegated to a `TimeScale` capability
//!
//! Stages are offline: each one takes a whole buffer and returns a whole
//! buffer. Nothing survives between renders except what the caller keeps.

pub mod dynamics;
pub mod filter;
pub mod modulation;
pub mod reverb;
pub mod shaping;
pub mod texture;
pub mod timescale;

use crate::domain::audio::{AudioBuffer, Result, SampleRate, TimeScale};

pub use dynamics::{compress, limit, Compressor, EnvelopeState, Limiter};
pub use filter::{apply_cascade, BiquadCoeffs, BiquadFilter, FilterKind, FilterStage};
pub use modulation::{fractional_delay, wow_flutter_curve, WowFlutter};
pub use reverb::{convolve, impulse_response, reverb, ConvolutionReverb};
pub use shaping::{bitcrush, saturate, Bitcrusher, Saturation};
pub use texture::{add_noise, pink_noise, stereo_width, NoiseLayer, NoiseSource, StereoWidth};
pub use timescale::{PitchShift, TimeStretch};

/// Everything a stage may need besides the buffer itself
pub struct RenderContext<'a> {
    pub sample_rate: SampleRate,
    /// Random source for the texture stage
    pub noise: &'a mut NoiseSource,
    /// External time-stretch / pitch-shift implementation
    pub time_scale: &'a dyn TimeScale,
}

/// Core trait for all render stages
///
/// A stage consumes the previous stage's full output and returns its
/// own. Stages configured at their identity value report themselves as
/// bypassed and are skipped by the chain.
pub trait Effect: Send + Sync {
    /// Process a whole buffer
    fn process(&self, buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer>;

    /// Check if the stage would leave the signal unchanged
    fn is_bypassed(&self) -> bool;

    /// Get stage name for logging
    fn name(&self) -> &str;

    /// Whether output frame count must equal input frame count
    fn preserves_length(&self) -> bool {
        true
    }
}
