//! Biquad filter design and recursive application
//!
//! Shelves use the standard cookbook formulation with the shelf slope
//! fixed at S = 1. Low/high-pass filters are 4th-order Butterworth,
//! realized as two cascaded bilinear biquad sections, which keeps the
//! recursion well conditioned for cutoffs close to DC.

use crate::domain::audio::{AudioBuffer, Result, SampleRate};
use crate::domain::dsp::{Effect, RenderContext};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::trace;

/// Q of the two sections of a 4th-order Butterworth: 1/(2cos(pi/8)), 1/(2cos(3pi/8))
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_7];

/// Biquad filter coefficients
///
/// Direct Form I implementation for numerical stability.
/// Coefficients are computed in f64; `a0` is normalized to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self {
            b0: b[0] / a0,
            b1: b[1] / a0,
            b2: b[2] / a0,
            a1: a[1] / a0,
            a2: a[2] / a0,
        }
    }

    /// Shelf intermediates: (A, cos w0, 2 sqrt(A) alpha) with S = 1
    fn shelf_terms(sample_rate: f64, freq: f64, gain_db: f64) -> (f64, f64, f64) {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let slope = 1.0;
        let alpha = w0.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
        (a, w0.cos(), 2.0 * a.sqrt() * alpha)
    }

    /// Calculate coefficients for a low shelf filter
    ///
    /// Boosts or cuts frequencies below `freq` by `gain_db`.
    #[must_use]
    pub fn low_shelf(sample_rate: f64, freq: f64, gain_db: f64) -> Self {
        let (a, cos_w0, k) = Self::shelf_terms(sample_rate, freq, gain_db);

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + k);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - k);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + k;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - k;

        Self::normalized([b0, b1, b2], [a0, a1, a2])
    }

    /// Calculate coefficients for a high shelf filter
    ///
    /// Boosts or cuts frequencies above `freq` by `gain_db`.
    #[must_use]
    pub fn high_shelf(sample_rate: f64, freq: f64, gain_db: f64) -> Self {
        let (a, cos_w0, k) = Self::shelf_terms(sample_rate, freq, gain_db);

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + k);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - k);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + k;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - k;

        Self::normalized([b0, b1, b2], [a0, a1, a2])
    }

    /// Second-order low-pass section with quality factor `q`
    #[must_use]
    pub fn low_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b1 = 1.0 - cos_w0;
        Self::normalized(
            [b1 / 2.0, b1, b1 / 2.0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Second-order high-pass section with quality factor `q`
    #[must_use]
    pub fn high_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        Self::normalized(
            [b0, -(1.0 + cos_w0), b0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Magnitude response at `freq` Hz
    pub fn magnitude(&self, sample_rate: f64, freq: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}

/// Filter requested by a stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    LowShelf { freq: f32, gain_db: f32 },
    HighShelf { freq: f32, gain_db: f32 },
    LowPass { cutoff: f32 },
    HighPass { cutoff: f32 },
}

impl FilterKind {
    /// Design the cascade for this filter
    ///
    /// Returns `None` when the filter is an identity: a 0 dB shelf, a
    /// high-pass at or below 0 Hz, or a low-pass at or above Nyquist.
    /// Any other frequency must lie strictly between 0 and Nyquist.
    pub fn design(&self, sample_rate: SampleRate) -> Option<Vec<BiquadCoeffs>> {
        let sr = f64::from(sample_rate.hz());
        let nyquist = sample_rate.nyquist();

        match *self {
            FilterKind::LowShelf { gain_db, .. } | FilterKind::HighShelf { gain_db, .. }
                if gain_db == 0.0 =>
            {
                None
            }
            FilterKind::LowPass { cutoff } if cutoff >= nyquist => None,
            FilterKind::HighPass { cutoff } if cutoff <= 0.0 => None,
            FilterKind::LowShelf { freq, gain_db } => {
                debug_assert!(freq > 0.0 && freq < nyquist);
                Some(vec![BiquadCoeffs::low_shelf(
                    sr,
                    f64::from(freq),
                    f64::from(gain_db),
                )])
            }
            FilterKind::HighShelf { freq, gain_db } => {
                debug_assert!(freq > 0.0 && freq < nyquist);
                Some(vec![BiquadCoeffs::high_shelf(
                    sr,
                    f64::from(freq),
                    f64::from(gain_db),
                )])
            }
            FilterKind::LowPass { cutoff } => {
                debug_assert!(cutoff > 0.0);
                Some(
                    BUTTERWORTH_Q4
                        .iter()
                        .map(|&q| BiquadCoeffs::low_pass(sr, f64::from(cutoff), q))
                        .collect(),
                )
            }
            FilterKind::HighPass { cutoff } => {
                debug_assert!(cutoff < nyquist);
                Some(
                    BUTTERWORTH_Q4
                        .iter()
                        .map(|&q| BiquadCoeffs::high_pass(sr, f64::from(cutoff), q))
                        .collect(),
                )
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FilterKind::LowShelf { .. } => "low_shelf",
            FilterKind::HighShelf { .. } => "high_shelf",
            FilterKind::LowPass { .. } => "lowpass",
            FilterKind::HighPass { .. } => "highpass",
        }
    }
}

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I is chosen over Transposed Direct Form II for:
/// - Better numerical stability with low-frequency filters
/// - No internal state overflow with high-gain shelves
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f64,
    x2: f64,
    // Previous output samples (y[n-1], y[n-2])
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    /// Create a new biquad filter with zero history
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Process a single sample
    #[inline]
    fn process_sample(&mut self, x: f64) -> f64 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        // Update state
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(f64::from(*sample)) as f32;
        }
    }
}

/// Run every section over every channel, each starting from silence
pub fn apply_cascade(buffer: &mut AudioBuffer, sections: &[BiquadCoeffs]) {
    for channel in buffer.channels_mut() {
        for coeffs in sections {
            BiquadFilter::new(*coeffs).process(channel);
        }
    }
}

/// A designed filter as a render stage
#[derive(Debug, Clone)]
pub struct FilterStage {
    kind: FilterKind,
    sections: Option<Vec<BiquadCoeffs>>,
}

impl FilterStage {
    /// Design `kind` for `sample_rate`; identity designs become a bypass
    pub fn new(kind: FilterKind, sample_rate: SampleRate) -> Self {
        let sections = kind.design(sample_rate);
        trace!(
            "{} designed: {:?} ({} sections)",
            kind.label(),
            kind,
            sections.as_ref().map_or(0, Vec::len)
        );
        Self { kind, sections }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }
}

impl Effect for FilterStage {
    fn process(&self, mut buffer: AudioBuffer, _ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        if let Some(sections) = &self.sections {
            apply_cascade(&mut buffer, sections);
        }
        Ok(buffer)
    }

    fn is_bypassed(&self) -> bool {
        self.sections.is_none()
    }

    fn name(&self) -> &str {
        self.kind.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn cascade_magnitude(sections: &[BiquadCoeffs], freq: f64) -> f64 {
        sections.iter().map(|c| c.magnitude(SR, freq)).product()
    }

    // -------------------------------------------------------------------------
    // Design Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_biquad_unity() {
        let mut filter = BiquadFilter::new(BiquadCoeffs::default());

        let input = vec![0.5, 0.3, 0.7];
        let mut output = input.clone();
        filter.process(&mut output);

        assert_eq!(input, output);
    }

    #[test]
    fn test_low_shelf_dc_gain() {
        let coeffs = BiquadCoeffs::low_shelf(SR, 200.0, 6.0);
        let expected = 10.0_f64.powf(6.0 / 20.0);

        assert!((coeffs.magnitude(SR, 0.0) - expected).abs() < 1e-9);
        // Far above the corner the shelf is flat
        assert!((coeffs.magnitude(SR, 15000.0) - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_high_shelf_nyquist_gain() {
        let coeffs = BiquadCoeffs::high_shelf(SR, 10000.0, -6.0);
        let expected = 10.0_f64.powf(-6.0 / 20.0);

        assert!((coeffs.magnitude(SR, SR / 2.0) - expected).abs() < 1e-9);
        assert!((coeffs.magnitude(SR, 50.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_butterworth_lowpass_response() {
        let sections = FilterKind::LowPass { cutoff: 1000.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();
        assert_eq!(sections.len(), 2);

        assert!((cascade_magnitude(&sections, 0.0) - 1.0).abs() < 1e-9);
        assert!((cascade_magnitude(&sections, 1000.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        // 4th order: roughly -48 dB two octaves above cutoff
        assert!(cascade_magnitude(&sections, 4000.0) < 0.01);
    }

    #[test]
    fn test_butterworth_highpass_response() {
        let sections = FilterKind::HighPass { cutoff: 30.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();

        assert!(cascade_magnitude(&sections, 0.0) < 1e-9);
        assert!((cascade_magnitude(&sections, 30.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((cascade_magnitude(&sections, 1000.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_designs_are_skipped() {
        let sr = SampleRate::HZ_44100;
        assert!(FilterKind::LowShelf { freq: 200.0, gain_db: 0.0 }.design(sr).is_none());
        assert!(FilterKind::HighShelf { freq: 10000.0, gain_db: 0.0 }.design(sr).is_none());
        assert!(FilterKind::LowPass { cutoff: 22050.0 }.design(sr).is_none());
        assert!(FilterKind::LowPass { cutoff: 30000.0 }.design(sr).is_none());
        assert!(FilterKind::HighPass { cutoff: 0.0 }.design(sr).is_none());
        assert!(FilterKind::HighPass { cutoff: -5.0 }.design(sr).is_none());
    }

    // -------------------------------------------------------------------------
    // Application Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_highpass_attenuates_sine_below_cutoff() {
        let input = sine(1000.0, 44100, 44100);
        let mut buffer = AudioBuffer::new(vec![input.clone(), input.clone()]).unwrap();

        let sections = FilterKind::HighPass { cutoff: 2000.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();
        apply_cascade(&mut buffer, &sections);

        assert_eq!(buffer.num_frames(), input.len());
        assert!(rms(buffer.channel(0)) < rms(&input) * 0.1);
        assert!(rms(buffer.channel(1)) < rms(&input) * 0.1);
    }

    #[test]
    fn test_lowpass_passes_sine_below_cutoff() {
        let input = sine(200.0, 44100, 44100);
        let mut buffer = AudioBuffer::new(vec![input.clone()]).unwrap();

        let sections = FilterKind::LowPass { cutoff: 5000.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();
        apply_cascade(&mut buffer, &sections);

        let ratio = rms(&buffer.channel(0)[4410..]) / rms(&input[4410..]);
        assert!((ratio - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_channels_filtered_independently() {
        let impulse: Vec<f32> = std::iter::once(1.0).chain(std::iter::repeat(0.0).take(63)).collect();
        let mut buffer = AudioBuffer::new(vec![impulse, vec![0.0; 64]]).unwrap();

        let sections = FilterKind::LowPass { cutoff: 500.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();
        apply_cascade(&mut buffer, &sections);

        assert!(buffer.channel(0).iter().any(|&s| s != 0.0));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_every_call_starts_from_silence() {
        let sections = FilterKind::LowShelf { freq: 200.0, gain_db: 6.0 }
            .design(SampleRate::HZ_44100)
            .unwrap();

        let mut loud = AudioBuffer::new(vec![vec![0.5; 100]]).unwrap();
        apply_cascade(&mut loud, &sections);

        let mut silence = AudioBuffer::silence(1, 10).unwrap();
        apply_cascade(&mut silence, &sections);

        assert!(silence.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_filter_stage_bypass() {
        let stage = FilterStage::new(FilterKind::HighShelf { freq: 10000.0, gain_db: 0.0 }, SampleRate::HZ_44100);
        assert!(stage.is_bypassed());
        assert_eq!(stage.name(), "high_shelf");

        let stage = FilterStage::new(FilterKind::HighPass { cutoff: 30.0 }, SampleRate::HZ_44100);
        assert!(!stage.is_bypassed());
        assert_eq!(stage.name(), "highpass");
    }
}
