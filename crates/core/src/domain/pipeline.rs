//! Render chain
//!
//! `EffectsChain` turns a `ParameterSet` into the fixed sequence of stages
//! and runs a whole buffer through it. Stages at their identity value are
//! skipped; every stage that must keep the buffer shape is checked after
//! it runs.

use crate::domain::audio::{AudioBuffer, AudioError, Result, SampleRate, TimeScale};
use crate::domain::dsp::{
    Bitcrusher, Compressor, ConvolutionReverb, Effect, FilterKind, FilterStage, Limiter,
    NoiseLayer, NoiseSource, PitchShift, RenderContext, Saturation, StereoWidth, TimeStretch,
    WowFlutter,
};
use crate::domain::params::{ParamKey, ParameterSet, BASS_SHELF_FREQ};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One slot of the render chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    TimeStretch,
    PitchShift,
    HighPass,
    LowPass,
    BassShelf,
    TrebleShelf,
    Saturation,
    Compression,
    Bitcrush,
    WowFlutter,
    StereoWidth,
    Noise,
    Reverb,
    Limiter,
}

impl Stage {
    /// Execution order
    pub const ORDER: [Stage; 14] = [
        Stage::TimeStretch,
        Stage::PitchShift,
        Stage::HighPass,
        Stage::LowPass,
        Stage::BassShelf,
        Stage::TrebleShelf,
        Stage::Saturation,
        Stage::Compression,
        Stage::Bitcrush,
        Stage::WowFlutter,
        Stage::StereoWidth,
        Stage::Noise,
        Stage::Reverb,
        Stage::Limiter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::TimeStretch => "time_stretch",
            Stage::PitchShift => "pitch_shift",
            Stage::HighPass => "highpass",
            Stage::LowPass => "lowpass",
            Stage::BassShelf => "low_shelf",
            Stage::TrebleShelf => "high_shelf",
            Stage::Saturation => "saturation",
            Stage::Compression => "compression",
            Stage::Bitcrush => "bitcrush",
            Stage::WowFlutter => "wow_flutter",
            Stage::StereoWidth => "stereo_width",
            Stage::Noise => "noise",
            Stage::Reverb => "reverb",
            Stage::Limiter => "limiter",
        }
    }

    /// Parameters this stage reads
    pub fn params(self) -> &'static [ParamKey] {
        match self {
            Stage::TimeStretch => &[ParamKey::TimeStretch],
            Stage::PitchShift => &[ParamKey::PitchShift],
            Stage::HighPass => &[ParamKey::HighpassHz],
            Stage::LowPass => &[ParamKey::LowpassHz],
            Stage::BassShelf => &[ParamKey::BassDb],
            Stage::TrebleShelf => &[ParamKey::HighshelfDb, ParamKey::HighshelfFreq],
            Stage::Saturation => &[ParamKey::Saturation],
            Stage::Compression => &[ParamKey::Compression],
            Stage::Bitcrush => &[ParamKey::Bitcrush],
            Stage::WowFlutter => &[ParamKey::WowFlutter],
            Stage::StereoWidth => &[ParamKey::StereoWidth],
            Stage::Noise => &[ParamKey::Noise],
            Stage::Reverb => &[ParamKey::Reverb],
            Stage::Limiter => &[ParamKey::Limiter],
        }
    }

    /// Create the effect for this slot from validated parameters
    fn build(self, params: &ParameterSet, sample_rate: SampleRate) -> Box<dyn Effect> {
        match self {
            Stage::TimeStretch => Box::new(TimeStretch::new(params.get(ParamKey::TimeStretch))),
            Stage::PitchShift => Box::new(PitchShift::new(params.get(ParamKey::PitchShift))),
            Stage::HighPass => Box::new(FilterStage::new(
                FilterKind::HighPass {
                    cutoff: params.get(ParamKey::HighpassHz),
                },
                sample_rate,
            )),
            Stage::LowPass => Box::new(FilterStage::new(
                FilterKind::LowPass {
                    cutoff: params.get(ParamKey::LowpassHz),
                },
                sample_rate,
            )),
            Stage::BassShelf => Box::new(FilterStage::new(
                FilterKind::LowShelf {
                    freq: BASS_SHELF_FREQ,
                    gain_db: params.get(ParamKey::BassDb),
                },
                sample_rate,
            )),
            Stage::TrebleShelf => Box::new(FilterStage::new(
                FilterKind::HighShelf {
                    freq: params.get(ParamKey::HighshelfFreq),
                    gain_db: params.get(ParamKey::HighshelfDb),
                },
                sample_rate,
            )),
            Stage::Saturation => Box::new(Saturation::new(params.get(ParamKey::Saturation))),
            Stage::Compression => Box::new(Compressor::new(params.get(ParamKey::Compression))),
            Stage::Bitcrush => Box::new(Bitcrusher::new(params.get(ParamKey::Bitcrush))),
            Stage::WowFlutter => Box::new(WowFlutter::new(params.get(ParamKey::WowFlutter))),
            Stage::StereoWidth => Box::new(StereoWidth::new(params.get(ParamKey::StereoWidth))),
            Stage::Noise => Box::new(NoiseLayer::new(params.get(ParamKey::Noise))),
            Stage::Reverb => Box::new(ConvolutionReverb::new(params.get(ParamKey::Reverb))),
            Stage::Limiter => Box::new(Limiter::new(params.get(ParamKey::Limiter))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully configured render chain for one sample rate
pub struct EffectsChain {
    sample_rate: SampleRate,
    stages: Vec<(Stage, Box<dyn Effect>)>,
}

impl EffectsChain {
    /// Validate `params` and build every stage
    ///
    /// Unknown parameter names are logged and ignored.
    pub fn new(params: &ParameterSet, sample_rate: SampleRate) -> Result<Self> {
        for name in params.unknown_keys() {
            warn!("Ignoring unknown parameter '{}'", name);
        }
        params.validate(sample_rate)?;

        let stages = Stage::ORDER
            .iter()
            .map(|&stage| (stage, stage.build(params, sample_rate)))
            .collect();

        Ok(Self {
            sample_rate,
            stages,
        })
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Number of slots, bypassed ones included
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages that will actually touch the signal, in order
    pub fn active_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|(_, effect)| !effect.is_bypassed())
            .map(|(stage, _)| *stage)
            .collect()
    }

    /// Run `buffer` through every active stage
    pub fn process(
        &self,
        buffer: AudioBuffer,
        noise: &mut NoiseSource,
        time_scale: &dyn TimeScale,
    ) -> Result<AudioBuffer> {
        let started = Instant::now();
        let input_frames = buffer.num_frames();

        let mut ctx = RenderContext {
            sample_rate: self.sample_rate,
            noise,
            time_scale,
        };

        let mut buffer = buffer;
        for (stage, effect) in &self.stages {
            if effect.is_bypassed() {
                continue;
            }

            let frames = buffer.num_frames();
            let channels = buffer.num_channels();

            buffer = effect.process(buffer, &mut ctx)?;

            if buffer.num_channels() != channels {
                return Err(AudioError::ChannelMismatch {
                    stage: stage.name().to_string(),
                    expected: channels,
                    actual: buffer.num_channels(),
                });
            }
            if effect.preserves_length() && buffer.num_frames() != frames {
                return Err(AudioError::LengthMismatch {
                    stage: stage.name().to_string(),
                    expected: frames,
                    actual: buffer.num_frames(),
                });
            }

            debug!("{} -> {} frames", stage, buffer.num_frames());
        }

        info!(
            "Rendered {} -> {} frames x {} channels at {} in {:?}",
            input_frames,
            buffer.num_frames(),
            buffer.num_channels(),
            self.sample_rate,
            started.elapsed()
        );

        Ok(buffer)
    }
}

impl fmt::Debug for EffectsChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectsChain")
            .field("sample_rate", &self.sample_rate)
            .field("active", &self.active_stages())
            .finish()
    }
}

/// Build a chain for `params` and render `buffer` through it
pub fn render(
    buffer: AudioBuffer,
    sample_rate: SampleRate,
    params: &ParameterSet,
    noise: &mut NoiseSource,
    time_scale: &dyn TimeScale,
) -> Result<AudioBuffer> {
    EffectsChain::new(params, sample_rate)?.process(buffer, noise, time_scale)
}
