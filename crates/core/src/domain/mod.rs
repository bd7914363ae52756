//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod params;
pub mod pipeline;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioBuffer, AudioCodec, AudioError, SampleRate, TimeScale};
pub use config::{
    builtin_preset, builtin_presets, BuiltinPreset, ConfigError, ConfigManager, LofiConfig, Preset,
    PresetManager, RenderConfig,
};
pub use dsp::{Effect, NoiseSource, RenderContext};
pub use params::{ParamKey, ParameterSet};
pub use pipeline::{render, EffectsChain, Stage};
