//! Waveshaping saturation and bitcrushing

use crate::domain::audio::{AudioBuffer, Result};
use crate::domain::dsp::{Effect, RenderContext};
use tracing::trace;

/// Bit depth at amount 0
const BASE_BITS: i32 = 16;
/// Lowest bit depth the quantizer will go to
const MIN_BITS: i32 = 1;
/// Amount above which sample-and-hold decimation kicks in
const DECIMATE_ABOVE: f32 = 0.3;

// ============================================================================
// SATURATION
// ============================================================================

/// Normalized tanh saturation
///
/// `tanh(x * drive) / tanh(drive)` keeps a full-scale input at full
/// scale, so raising the drive adds harmonics without losing level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturation {
    amount: f32,
}

impl Saturation {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }

    pub fn drive(&self) -> f32 {
        1.0 + self.amount * 4.0
    }

    pub fn apply(&self, buffer: &mut AudioBuffer) {
        if self.amount <= 0.0 {
            return;
        }
        let drive = self.drive();
        let norm = drive.tanh();
        buffer.map_samples(|s| (s * drive).tanh() / norm);
    }
}

impl Effect for Saturation {
    fn process(&self, mut buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "saturation"
    }
}

pub fn saturate(buffer: &mut AudioBuffer, amount: f32) {
    Saturation::new(amount).apply(buffer);
}

// ============================================================================
// BITCRUSHER
// ============================================================================

/// Bit-depth reduction plus sample-and-hold decimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bitcrusher {
    amount: f32,
}

impl Bitcrusher {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }

    /// 16 bits at amount 0 down to 4 bits at amount 1, never below 1
    pub fn bits(&self) -> i32 {
        (BASE_BITS - (self.amount * 12.0).floor() as i32).max(MIN_BITS)
    }

    /// Hold length in frames, or `None` when decimation is off
    pub fn downsample_factor(&self) -> Option<usize> {
        (self.amount > DECIMATE_ABOVE).then(|| 1 + (self.amount * 8.0).floor() as usize)
    }

    pub fn apply(&self, buffer: AudioBuffer) -> Result<AudioBuffer> {
        if self.amount <= 0.0 {
            return Ok(buffer);
        }

        let mut buffer = buffer;
        let step = 2.0_f32.powi(self.bits());
        buffer.map_samples(|s| (s * step).round() / step);

        let Some(factor) = self.downsample_factor() else {
            return Ok(buffer);
        };

        trace!("Bitcrusher: {} bits, hold {} frames", self.bits(), factor);

        // Keep every factor-th frame, hold it, then restore the frame count
        let frames = buffer.num_frames();
        let held: Vec<Vec<f32>> = buffer
            .channels()
            .iter()
            .map(|channel| {
                channel
                    .iter()
                    .step_by(factor)
                    .flat_map(|&s| std::iter::repeat(s).take(factor))
                    .collect()
            })
            .collect();

        let mut crushed = AudioBuffer::new(held)?;
        crushed.resize_frames(frames);
        Ok(crushed)
    }
}

impl Effect for Bitcrusher {
    fn process(&self, buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "bitcrush"
    }
}

pub fn bitcrush(buffer: AudioBuffer, amount: f32) -> Result<AudioBuffer> {
    Bitcrusher::new(amount).apply(buffer)
}
