//! Configuration management for lofi
//!
//! This module provides:
//! - The render configuration file (`config.toml`) with TOML serialization
//! - Built-in presets and a directory of user presets
//! - The per-user configuration directory

use crate::domain::params::{ParamKey, ParameterSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// How a render is run, as opposed to what it does to the sound
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Noise seed; `None` draws from OS entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Preset applied underneath `params`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// Complete lofi configuration
///
/// ```toml
/// [render]
/// seed = 7
/// preset = "tape"
///
/// [params]
/// noise = 0.2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LofiConfig {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub params: ParameterSet,
}

impl LofiConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!(params = config.params.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// A named parameter set stored as `<name>.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub params: ParameterSet,
}

/// Preset compiled into the binary
#[derive(Debug, Clone, Copy)]
pub struct BuiltinPreset {
    pub name: &'static str,
    pub description: &'static str,
    values: &'static [(ParamKey, f32)],
}

impl BuiltinPreset {
    pub fn params(&self) -> ParameterSet {
        self.values.iter().copied().collect()
    }

    pub fn to_preset(&self) -> Preset {
        Preset {
            description: self.description.to_string(),
            params: self.params(),
        }
    }
}

static BUILTIN_PRESETS: &[BuiltinPreset] = &[
    BuiltinPreset {
        name: "clean",
        description: "Default band-limiting and limiter only",
        values: &[],
    },
    BuiltinPreset {
        name: "chillhop",
        description: "Warm, slowed and slightly detuned",
        values: &[
            (ParamKey::TimeStretch, 0.92),
            (ParamKey::PitchShift, -2.0),
            (ParamKey::Saturation, 0.6),
            (ParamKey::WowFlutter, 0.25),
            (ParamKey::Noise, 0.12),
            (ParamKey::Reverb, 0.2),
        ],
    },
    BuiltinPreset {
        name: "tape",
        description: "Worn cassette with wobble and dull highs",
        values: &[
            (ParamKey::LowpassHz, 10000.0),
            (ParamKey::HighshelfDb, -4.0),
            (ParamKey::Saturation, 0.4),
            (ParamKey::Compression, 0.3),
            (ParamKey::WowFlutter, 0.5),
            (ParamKey::Noise, 0.2),
        ],
    },
    BuiltinPreset {
        name: "vinyl",
        description: "Crackly record with a little low end",
        values: &[
            (ParamKey::HighpassHz, 60.0),
            (ParamKey::LowpassHz, 9000.0),
            (ParamKey::BassDb, 2.0),
            (ParamKey::Bitcrush, 0.1),
            (ParamKey::WowFlutter, 0.15),
            (ParamKey::Noise, 0.35),
            (ParamKey::Reverb, 0.1),
        ],
    },
    BuiltinPreset {
        name: "radio",
        description: "Narrow mono AM band",
        values: &[
            (ParamKey::HighpassHz, 300.0),
            (ParamKey::LowpassHz, 4000.0),
            (ParamKey::Saturation, 0.5),
            (ParamKey::Compression, 0.6),
            (ParamKey::Bitcrush, 0.35),
            (ParamKey::StereoWidth, 0.0),
            (ParamKey::Noise, 0.25),
        ],
    },
];

/// Every built-in preset, in display order
pub fn builtin_presets() -> &'static [BuiltinPreset] {
    BUILTIN_PRESETS
}

pub fn builtin_preset(name: &str) -> Option<&'static BuiltinPreset> {
    BUILTIN_PRESETS.iter().find(|preset| preset.name == name)
}

/// Preset manager for a directory of user presets
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    /// Create a new preset manager
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.preset_dir.join(format!("{}.toml", name))
    }

    /// List user presets; a missing directory holds none
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a user preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<Preset> {
        let path = self.preset_path(name);
        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        let contents = fs::read_to_string(&path).await?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save a user preset by name
    #[instrument(skip(self, preset))]
    pub async fn save_preset(&self, name: &str, preset: &Preset) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!("invalid preset name '{}'", name)));
        }

        fs::create_dir_all(&self.preset_dir).await?;
        let toml_str = toml::to_string_pretty(preset)?;
        fs::write(self.preset_path(name), toml_str).await?;

        info!(name, "Preset saved");
        Ok(())
    }

    /// Delete a user preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name);
        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a user preset exists
    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).exists()
    }

    /// Look a preset up by name, user presets shadowing built-ins
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<Preset> {
        if self.preset_exists(name).await {
            return self.load_preset(name).await;
        }

        builtin_preset(name)
            .map(BuiltinPreset::to_preset)
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }
}

// ============================================================================
// CONFIG MANAGER
// ============================================================================

/// Configuration manager for the per-user lofi directory
///
/// Holds `config.toml` and a `presets/` directory, by default under
/// `~/.config/lofi`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/lofi` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("lofi"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn preset_dir(&self) -> PathBuf {
        self.config_dir.join("presets")
    }

    pub fn presets(&self) -> PresetManager {
        PresetManager::new(self.preset_dir())
    }

    /// Load configuration from file
    ///
    /// A missing file yields the default configuration. A corrupt file is
    /// backed up next to itself and the default is used instead.
    #[instrument(skip(self))]
    pub async fn load(&self) -> LofiConfig {
        if !self.config_path.exists() {
            debug!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            return LofiConfig::default();
        }

        match LofiConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                LofiConfig::default()
            }
        }
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &LofiConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
