//! Audio buffer abstractions and external capability interfaces
//!
//! This module defines the in-memory buffer every stage consumes and
//! produces, plus the traits for the collaborators the pipeline does not
//! implement itself (file codecs, time-scale modification). Concrete
//! implementations live in the `infra` crate.

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while rendering audio
#[derive(Debug, Error)]
pub enum AudioError {
    /// A parameter is outside the domain its stage accepts
    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: String,
        value: f32,
        reason: String,
    },

    /// Buffer shape is unusable (no channels, ragged channels...)
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// A length-preserving stage changed the frame count
    #[error("Stage {stage} changed frame count: expected {expected}, got {actual}")]
    LengthMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },

    /// A stage changed the channel count
    #[error("Stage {stage} changed channel count: expected {expected}, got {actual}")]
    ChannelMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },

    /// Time-stretch or pitch-shift capability failed
    #[error("Time-scale error: {0}")]
    TimeScale(String),

    /// Decoding or encoding failed
    #[error("Codec error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio sample rate in Hz
///
/// Constant for the whole of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRate(u32);

impl SampleRate {
    pub const HZ_44100: SampleRate = SampleRate(44100);
    pub const HZ_48000: SampleRate = SampleRate(48000);

    /// Create a sample rate, rejecting zero
    pub fn new(hz: u32) -> Result<Self> {
        if hz == 0 {
            return Err(AudioError::InvalidParameter {
                name: "sample_rate".to_string(),
                value: 0.0,
                reason: "sample rate must be positive".to_string(),
            });
        }
        Ok(Self(hz))
    }

    pub fn hz(&self) -> u32 {
        self.0
    }

    pub fn as_f32(&self) -> f32 {
        self.0 as f32
    }

    /// Half the sample rate
    pub fn nyquist(&self) -> f32 {
        self.0 as f32 / 2.0
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// Multi-channel audio held planar: one sample vector per channel
///
/// Every channel has the same length, and there is always at least one
/// channel, so a mono file is still frames x 1.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample vectors
    pub fn new(channels: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(AudioError::InvalidBuffer(
                "buffer needs at least one channel".to_string(),
            ));
        };

        let frames = first.len();
        if let Some((index, ragged)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(AudioError::InvalidBuffer(format!(
                "channel {} has {} frames, expected {}",
                index,
                ragged.len(),
                frames
            )));
        }

        Ok(Self { channels })
    }

    /// A buffer of digital silence
    pub fn silence(num_channels: usize, frames: usize) -> Result<Self> {
        Self::new(vec![vec![0.0; frames]; num_channels])
    }

    /// De-interleave `L R L R ...` style samples
    pub fn from_interleaved(samples: &[f32], num_channels: usize) -> Result<Self> {
        if num_channels == 0 {
            return Err(AudioError::InvalidBuffer(
                "buffer needs at least one channel".to_string(),
            ));
        }
        if samples.len() % num_channels != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                num_channels
            )));
        }

        let frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Self::new(channels)
    }

    /// Interleave back into `L R L R ...` order
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.num_frames() * self.num_channels());
        for i in 0..self.num_frames() {
            out.extend(self.channels.iter().map(|ch| ch[i]));
        }
        out
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mutable access to each channel; lengths cannot change through it
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(|ch| ch.as_mut_slice())
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Apply `f` to every sample of every channel
    pub fn map_samples(&mut self, mut f: impl FnMut(f32) -> f32) {
        for sample in self.channels.iter_mut().flatten() {
            *sample = f(*sample);
        }
    }

    /// Largest absolute sample across channels at one frame
    #[inline]
    pub fn frame_peak(&self, frame: usize) -> f32 {
        self.channels
            .iter()
            .map(|ch| ch[frame].abs())
            .fold(0.0_f32, f32::max)
    }

    /// Largest absolute sample in the whole buffer
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Root mean square over all samples of all channels
    pub fn rms(&self) -> f32 {
        let count = self.num_frames() * self.num_channels();
        if count == 0 {
            return 0.0;
        }
        let sum_sq: f64 = self
            .channels
            .iter()
            .flatten()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        (sum_sq / count as f64).sqrt() as f32
    }

    /// True when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.channels.iter().flatten().all(|s| s.is_finite())
    }

    /// Truncate or zero-pad every channel at the end to `frames`
    pub fn resize_frames(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
    }
}

/// Time-scale modification capability (phase vocoder or similar)
///
/// Operates on one channel at a time. The returned length may differ
/// from the input; the pipeline re-homogenizes channel lengths.
pub trait TimeScale: Send + Sync {
    /// Change duration by `rate` (2.0 = twice as fast) keeping pitch
    fn stretch(&self, signal: &[f32], rate: f32) -> Result<Vec<f32>>;

    /// Shift pitch by `semitones` keeping duration
    fn pitch_shift(&self, signal: &[f32], sample_rate: SampleRate, semitones: f32)
        -> Result<Vec<f32>>;
}

/// Audio file decoding/encoding capability
pub trait AudioCodec: Send + Sync {
    /// Decode a file into a frames x channels buffer
    fn load(&self, path: &Path) -> Result<(AudioBuffer, SampleRate)>;

    /// Encode a buffer to a file
    fn save(&self, path: &Path, buffer: &AudioBuffer, sample_rate: SampleRate) -> Result<()>;
}
