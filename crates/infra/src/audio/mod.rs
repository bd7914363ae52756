//! File and signal backends for the render pipeline
//!
//! - `codec`: WAV files through `hound`
//! - `resample`: linear-interpolation resampling
//! - `vocoder`: STFT phase vocoder for time-stretch and pitch-shift

pub mod codec;
pub mod resample;
pub mod vocoder;

pub use codec::WavCodec;
pub use resample::resample_to_length;
pub use vocoder::PhaseVocoder;
