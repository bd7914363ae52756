//! Lofi infrastructure layer
//!
//! Concrete implementations of the capabilities `lofi-core` only
//! describes: WAV decoding/encoding and phase-vocoder time-scale
//! modification.

pub mod audio;

pub use audio::{resample_to_length, PhaseVocoder, WavCodec};
