//! STFT phase vocoder
//!
//! Time-stretch resamples the short-time spectrum along the time axis,
//! interpolating magnitudes between neighbouring frames and advancing
//! each bin's phase by its measured instantaneous frequency. Pitch
//! shift is a time-stretch by `2^(-semitones/12)` followed by a linear
//! resample back to the input length.

use crate::audio::resample::resample_to_length;
use lofi_core::domain::audio::{AudioError, Result, SampleRate, TimeScale};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::debug;

/// STFT frame size
pub const N_FFT: usize = 2048;
/// Frame advance
pub const HOP: usize = 512;

type Spectrogram = Vec<Vec<Complex64>>;

/// Phase vocoder time-scale modification
pub struct PhaseVocoder {
    n_fft: usize,
    hop: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl PhaseVocoder {
    pub fn new() -> Self {
        Self::with_size(N_FFT, HOP)
    }

    /// Custom frame size and hop; `hop` is clamped to `1..=n_fft`
    pub fn with_size(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        let hop = hop.clamp(1, n_fft);

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        // Periodic Hann
        let window = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (TAU * i as f64 / n_fft as f64).cos())
            .collect();

        Self {
            n_fft,
            hop,
            window,
            forward,
            inverse,
        }
    }

    fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centered STFT: the signal is zero-padded by half a frame on both ends
    fn stft(&self, signal: &[f32]) -> Spectrogram {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0_f64; signal.len() + 2 * pad];
        for (p, &s) in padded[pad..].iter_mut().zip(signal) {
            *p = f64::from(s);
        }

        let frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let mut work = vec![Complex64::new(0.0, 0.0); self.n_fft];

        (0..frames)
            .map(|t| {
                let start = t * self.hop;
                for ((c, &x), &w) in work
                    .iter_mut()
                    .zip(&padded[start..start + self.n_fft])
                    .zip(&self.window)
                {
                    *c = Complex64::new(x * w, 0.0);
                }
                self.forward.process(&mut work);
                work[..self.bins()].to_vec()
            })
            .collect()
    }

    /// Windowed overlap-add inverse of `stft`, cut or padded to `length`
    fn istft(&self, spectrogram: &Spectrogram, length: usize) -> Vec<f32> {
        let pad = self.n_fft / 2;
        let total = self.n_fft + self.hop * spectrogram.len().saturating_sub(1);
        let mut output = vec![0.0_f64; total];
        let mut norm = vec![0.0_f64; total];

        let scale = 1.0 / self.n_fft as f64;
        let mut work = vec![Complex64::new(0.0, 0.0); self.n_fft];

        for (t, frame) in spectrogram.iter().enumerate() {
            work[..frame.len()].copy_from_slice(frame);
            // Rebuild the negative frequencies from conjugate symmetry
            for k in frame.len()..self.n_fft {
                work[k] = work[self.n_fft - k].conj();
            }
            self.inverse.process(&mut work);

            let start = t * self.hop;
            for (i, (c, &w)) in work.iter().zip(&self.window).enumerate() {
                output[start + i] += c.re * scale * w;
                norm[start + i] += w * w;
            }
        }

        (0..length)
            .map(|i| {
                let j = i + pad;
                match (output.get(j), norm.get(j)) {
                    (Some(&y), Some(&n)) if n > 1e-10 => (y / n) as f32,
                    (Some(&y), Some(_)) => y as f32,
                    _ => 0.0,
                }
            })
            .collect()
    }

    /// Resample the spectrogram along time by `rate`
    fn stretch_spectrogram(&self, spectrogram: &Spectrogram, rate: f64) -> Spectrogram {
        let bins = self.bins();
        let frames = spectrogram.len();
        let silent = vec![Complex64::new(0.0, 0.0); bins];
        let column = |t: usize| spectrogram.get(t).unwrap_or(&silent);

        // Expected phase advance per hop for each bin
        let advance: Vec<f64> = (0..bins)
            .map(|k| TAU * self.hop as f64 * k as f64 / self.n_fft as f64)
            .collect();

        let mut phase: Vec<f64> = column(0).iter().map(|c| c.arg()).collect();
        let steps = (frames as f64 / rate).ceil() as usize;
        let mut stretched = Vec::with_capacity(steps);

        for n in 0..steps {
            let position = n as f64 * rate;
            let left = position.floor() as usize;
            let alpha = position - left as f64;
            let (a, b) = (column(left), column(left + 1));

            let frame = (0..bins)
                .map(|k| {
                    let mag = (1.0 - alpha) * a[k].norm() + alpha * b[k].norm();
                    Complex64::from_polar(mag, phase[k])
                })
                .collect();
            stretched.push(frame);

            for k in 0..bins {
                let mut delta = b[k].arg() - a[k].arg() - advance[k];
                delta -= TAU * (delta / TAU).round();
                phase[k] += advance[k] + delta;
            }
        }

        stretched
    }

    /// Change duration by `1 / rate` without changing pitch
    ///
    /// The output has `round(len / rate)` samples.
    pub fn time_stretch(&self, signal: &[f32], rate: f64) -> Result<Vec<f32>> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AudioError::TimeScale(format!(
                "stretch rate must be positive, got {}",
                rate
            )));
        }

        let length = (signal.len() as f64 / rate).round() as usize;
        if signal.is_empty() {
            return Ok(Vec::new());
        }

        let spectrogram = self.stft(signal);
        let stretched = self.stretch_spectrogram(&spectrogram, rate);

        debug!(
            "Phase vocoder: {} frames -> {} frames ({} -> {} samples)",
            spectrogram.len(),
            stretched.len(),
            signal.len(),
            length
        );

        Ok(self.istft(&stretched, length))
    }
}

impl Default for PhaseVocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeScale for PhaseVocoder {
    fn stretch(&self, signal: &[f32], rate: f32) -> Result<Vec<f32>> {
        self.time_stretch(signal, f64::from(rate))
    }

    fn pitch_shift(&self, signal: &[f32], _sample_rate: SampleRate, semitones: f32) -> Result<Vec<f32>> {
        if semitones == 0.0 {
            return Ok(signal.to_vec());
        }

        let rate = 2.0_f64.powf(-f64::from(semitones) / 12.0);
        let stretched = self.time_stretch(signal, rate)?;
        Ok(resample_to_length(&stretched, signal.len()))
    }
}
