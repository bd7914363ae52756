//! Texture stages: pink noise / crackle / hiss, and mid-side stereo width

use crate::domain::audio::{AudioBuffer, Result};
use crate::domain::dsp::{Effect, RenderContext};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::trace;

/// Octave block lengths summed into the pink noise approximation
const PINK_OCTAVES: [usize; 5] = [1, 2, 4, 8, 16];

const PINK_LEVEL: f32 = 0.004;
const CRACKLE_ABOVE: f32 = 0.2;
const CRACKLE_DENSITY: f32 = 0.00005;
const CRACKLE_PEAK: f32 = 0.3;
const HISS_ABOVE: f32 = 0.05;
const HISS_STD: f32 = 0.003;

// ============================================================================
// NOISE SOURCE
// ============================================================================

/// Random source handed to the noise stage
///
/// A seeded source renders identically every time; an unseeded one is
/// drawn from OS entropy.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: ChaCha8Rng,
}

impl NoiseSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, otherwise from entropy
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Standard normal deviate
    #[inline]
    pub fn gaussian(&mut self) -> f32 {
        let z: f64 = self.rng.sample(StandardNormal);
        z as f32
    }

    /// Uniform deviate in `[0, 1)`
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Uniform deviate in `[low, high)`
    #[inline]
    pub fn uniform(&mut self, low: f32, high: f32) -> f32 {
        self.rng.gen_range(low..high)
    }
}

/// Sum of octave-spaced held gaussian blocks, averaged over the octaves
///
/// Each octave contributes `frames / octave` blocks of length `octave`,
/// scaled by `1 / octave`; a tail shorter than one block gets nothing
/// from that octave.
pub fn pink_noise(source: &mut NoiseSource, frames: usize) -> Vec<f32> {
    let mut pink = vec![0.0_f32; frames];

    for &octave in &PINK_OCTAVES {
        let scale = 1.0 / octave as f32;
        for block in pink.chunks_exact_mut(octave) {
            let value = source.gaussian() * scale;
            block.iter_mut().for_each(|s| *s += value);
        }
    }

    let norm = PINK_OCTAVES.len() as f32;
    pink.iter_mut().for_each(|s| *s /= norm);
    pink
}

// ============================================================================
// NOISE LAYER
// ============================================================================

/// Pink noise bed, sparse vinyl crackle and tape hiss
///
/// Crackle only appears above amount 0.2 and hiss above 0.05.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLayer {
    amount: f32,
}

impl NoiseLayer {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }

    pub fn apply(&self, buffer: &mut AudioBuffer, source: &mut NoiseSource) {
        let amount = self.amount;
        if amount <= 0.0 {
            return;
        }

        let frames = buffer.num_frames();
        let mut pops = 0usize;

        for channel in buffer.channels_mut() {
            let pink = pink_noise(source, frames);
            for (sample, p) in channel.iter_mut().zip(pink) {
                *sample += p * amount * PINK_LEVEL;
            }

            if amount > CRACKLE_ABOVE {
                let density = amount * CRACKLE_DENSITY;
                for sample in channel.iter_mut() {
                    if source.unit() < density {
                        *sample += source.uniform(-CRACKLE_PEAK, CRACKLE_PEAK) * amount * 0.5;
                        pops += 1;
                    }
                }
            }

            if amount > HISS_ABOVE {
                for sample in channel.iter_mut() {
                    *sample += source.gaussian() * HISS_STD * amount * 0.5;
                }
            }
        }

        trace!("Noise: amount={:.2}, {} crackle pops", amount, pops);
    }
}

impl Effect for NoiseLayer {
    fn process(&self, mut buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer, ctx.noise);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "noise"
    }
}

pub fn add_noise(buffer: &mut AudioBuffer, amount: f32, source: &mut NoiseSource) {
    NoiseLayer::new(amount).apply(buffer, source);
}

// ============================================================================
// STEREO WIDTH
// ============================================================================

/// Mid/side width on the first two channels
///
/// 0 collapses to mono, 1 leaves the image alone, 2 doubles the side
/// signal. Mono buffers pass through; channels past the second are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoWidth {
    width: f32,
}

impl StereoWidth {
    pub fn new(width: f32) -> Self {
        Self { width }
    }

    pub fn apply(&self, buffer: &mut AudioBuffer) {
        if self.is_bypassed() || buffer.num_channels() < 2 {
            return;
        }

        let width = self.width;
        let mut channels = buffer.channels_mut();
        let (Some(left), Some(right)) = (channels.next(), channels.next()) else {
            return;
        };

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mid = (*l + *r) / 2.0;
            let side = (*l - *r) / 2.0 * width;
            *l = mid + side;
            *r = mid - side;
        }
    }
}

impl Effect for StereoWidth {
    fn process(&self, mut buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.width == 1.0
    }

    fn name(&self) -> &str {
        "stereo_width"
    }
}

pub fn stereo_width(buffer: &mut AudioBuffer, width: f32) {
    StereoWidth::new(width).apply(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Noise Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = AudioBuffer::silence(2, 4096).unwrap();
        let mut b = AudioBuffer::silence(2, 4096).unwrap();

        add_noise(&mut a, 0.8, &mut NoiseSource::seeded(42));
        add_noise(&mut b, 0.8, &mut NoiseSource::seeded(42));

        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = AudioBuffer::silence(1, 1024).unwrap();
        let mut b = AudioBuffer::silence(1, 1024).unwrap();

        add_noise(&mut a, 0.5, &mut NoiseSource::seeded(1));
        add_noise(&mut b, 0.5, &mut NoiseSource::seeded(2));

        assert_ne!(a, b);
    }

    #[test]
    fn test_noise_zero_amount_is_identity() {
        let original = AudioBuffer::new(vec![vec![0.25; 256]]).unwrap();
        let mut buffer = original.clone();

        add_noise(&mut buffer, 0.0, &mut NoiseSource::seeded(3));
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_noise_stays_quiet() {
        let mut buffer = AudioBuffer::silence(2, 44100).unwrap();
        add_noise(&mut buffer, 0.1, &mut NoiseSource::seeded(9));

        assert!(buffer.is_finite());
        assert!(buffer.rms() > 0.0);
        // Below the crackle threshold the bed sits far under -40 dBFS
        assert!(buffer.rms() < 0.01);
    }

    #[test]
    fn test_pink_noise_tail_handling() {
        let mut source = NoiseSource::seeded(5);
        let pink = pink_noise(&mut source, 17);

        assert_eq!(pink.len(), 17);
        // Frame 16 is past every full 16-frame block but still gets octaves 1..8
        assert!(pink[16] != 0.0);
        assert!(pink_noise(&mut source, 0).is_empty());
    }

    #[test]
    fn test_pink_noise_level() {
        let mut source = NoiseSource::seeded(11);
        let pink = pink_noise(&mut source, 44100);

        // Variance sums 1/octave^2 over the octaves, divided by 5^2
        let expected = (PINK_OCTAVES
            .iter()
            .map(|&o| 1.0 / (o * o) as f32)
            .sum::<f32>()
            / 25.0)
            .sqrt();
        let rms = (pink.iter().map(|s| s * s).sum::<f32>() / pink.len() as f32).sqrt();
        assert!((rms - expected).abs() < expected * 0.1);
    }

    // -------------------------------------------------------------------------
    // Stereo Width Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_width_one_is_identity() {
        let original = AudioBuffer::new(vec![vec![0.5, 0.1], vec![-0.2, 0.3]]).unwrap();
        let mut buffer = original.clone();

        stereo_width(&mut buffer, 1.0);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_width_zero_collapses_to_mono() {
        let mut buffer = AudioBuffer::new(vec![vec![0.8, 0.0], vec![0.2, -0.4]]).unwrap();
        stereo_width(&mut buffer, 0.0);

        assert_eq!(buffer.channel(0), buffer.channel(1));
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((buffer.channel(0)[1] + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_width_two_doubles_side() {
        let mut buffer = AudioBuffer::new(vec![vec![0.6], vec![0.2]]).unwrap();
        stereo_width(&mut buffer, 2.0);

        // mid 0.4, side 0.2 -> 0.4
        assert!((buffer.channel(0)[0] - 0.8).abs() < 1e-6);
        assert!(buffer.channel(1)[0].abs() < 1e-6);
    }

    #[test]
    fn test_width_mono_passthrough() {
        let original = AudioBuffer::new(vec![vec![0.3, -0.3]]).unwrap();
        let mut buffer = original.clone();

        stereo_width(&mut buffer, 0.0);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_width_leaves_extra_channels() {
        let mut buffer =
            AudioBuffer::new(vec![vec![1.0], vec![0.0], vec![0.7]]).unwrap();
        stereo_width(&mut buffer, 0.0);

        assert_eq!(buffer.channel(0)[0], 0.5);
        assert_eq!(buffer.channel(1)[0], 0.5);
        assert_eq!(buffer.channel(2)[0], 0.7);
    }
}
