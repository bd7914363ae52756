//! Convolution reverb with a synthetic exponential-decay impulse response
//!
//! The impulse response is 0.4 s long regardless of amount; the amount
//! sets both how fast it decays and the dry/wet balance. Convolution runs
//! as FFT overlap-add so long renders stay linear in the input length.

use crate::domain::audio::{AudioBuffer, Result, SampleRate};
use crate::domain::dsp::{Effect, RenderContext};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::trace;

/// Impulse response length in seconds
const IR_SECONDS: f64 = 0.4;

/// Exponential decay `exp(-x)` with `x` spread evenly over `0..=decay`
///
/// `decay` is `0.3 + 1.2 * amount`, so a full-amount tail ends at
/// `exp(-1.5)`. The first tap is always 1.
pub fn impulse_response(sample_rate: SampleRate, amount: f32) -> Vec<f32> {
    let decay = 0.3 + 1.2 * f64::from(amount);
    let length = (f64::from(sample_rate.hz()) * IR_SECONDS) as usize;
    let span = length.saturating_sub(1).max(1) as f64;

    (0..length)
        .map(|k| (-decay * k as f64 / span).exp() as f32)
        .collect()
}

// ============================================================================
// CONVOLVER
// ============================================================================

/// Overlap-add FFT convolution against a fixed kernel
///
/// Output is the linear convolution truncated to the input length.
pub struct Convolver {
    kernel_len: usize,
    fft_size: usize,
    block: usize,
    spectrum: Vec<Complex64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Convolver {
    pub fn new(kernel: &[f32]) -> Self {
        let kernel_len = kernel.len();
        let fft_size = (2 * kernel_len).next_power_of_two().max(2);
        let block = fft_size + 1 - kernel_len.max(1);

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut spectrum = vec![Complex64::new(0.0, 0.0); fft_size];
        for (bin, &k) in spectrum.iter_mut().zip(kernel) {
            *bin = Complex64::new(f64::from(k), 0.0);
        }
        forward.process(&mut spectrum);

        Self {
            kernel_len,
            fft_size,
            block,
            spectrum,
            forward,
            inverse,
        }
    }

    pub fn process(&self, signal: &[f32]) -> Vec<f32> {
        let frames = signal.len();
        if self.kernel_len == 0 {
            return vec![0.0; frames];
        }

        let mut out = vec![0.0_f64; frames];
        let scale = 1.0 / self.fft_size as f64;
        let mut work = vec![Complex64::new(0.0, 0.0); self.fft_size];

        for (index, chunk) in signal.chunks(self.block).enumerate() {
            work.iter_mut().for_each(|c| *c = Complex64::new(0.0, 0.0));
            for (c, &s) in work.iter_mut().zip(chunk) {
                c.re = f64::from(s);
            }

            self.forward.process(&mut work);
            for (c, k) in work.iter_mut().zip(&self.spectrum) {
                *c *= *k;
            }
            self.inverse.process(&mut work);

            let offset = index * self.block;
            let tail = (chunk.len() + self.kernel_len - 1).min(frames - offset);
            for (o, c) in out[offset..offset + tail].iter_mut().zip(&work) {
                *o += c.re * scale;
            }
        }

        out.into_iter().map(|s| s as f32).collect()
    }
}

/// Linear convolution of `signal` with `kernel`, truncated to `signal.len()`
pub fn convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    Convolver::new(kernel).process(signal)
}

// ============================================================================
// REVERB STAGE
// ============================================================================

/// Dry/wet mix of the input and its convolution with the decay tail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvolutionReverb {
    amount: f32,
}

impl ConvolutionReverb {
    pub fn new(amount: f32) -> Self {
        Self { amount }
    }

    pub fn apply(&self, buffer: &mut AudioBuffer, sample_rate: SampleRate) {
        let amount = self.amount;
        if amount <= 0.0 {
            return;
        }

        let ir = impulse_response(sample_rate, amount);
        trace!("Reverb: {} tap impulse, mix={:.2}", ir.len(), amount);

        let convolver = Convolver::new(&ir);
        for channel in buffer.channels_mut() {
            let wet = convolver.process(channel);
            for (sample, w) in channel.iter_mut().zip(wet) {
                *sample = (1.0 - amount) * *sample + amount * w;
            }
        }
    }
}

impl Effect for ConvolutionReverb {
    fn process(&self, mut buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(&mut buffer, ctx.sample_rate);
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.amount <= 0.0
    }

    fn name(&self) -> &str {
        "reverb"
    }
}

pub fn reverb(buffer: &mut AudioBuffer, sample_rate: SampleRate, amount: f32) {
    ConvolutionReverb::new(amount).apply(buffer, sample_rate);
}
