//! Lofi CLI Application

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lofi_core::domain::{
    builtin_presets, AudioCodec, ConfigManager, EffectsChain, LofiConfig, NoiseSource, ParamKey,
    ParameterSet, Preset, PresetManager,
};
use lofi_infra::{PhaseVocoder, WavCodec};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "lofi")]
#[command(about = "Turn clean recordings into worn, warm lofi versions", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a WAV file through the lofi chain
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file (32-bit float)
        output: PathBuf,

        /// Built-in or user preset applied first
        #[arg(short, long)]
        preset: Option<String>,

        /// Config file (defaults to config.toml in the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override one parameter, e.g. `--set noise=0.3`
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        overrides: Vec<(ParamKey, f32)>,

        /// Seed for the noise stage (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List built-in and user presets
    Presets {
        /// User preset directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// List every parameter with its default and range
    Params,

    /// Print a preset as JSON
    ShowPreset {
        name: String,

        /// User preset directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Save a user preset, optionally starting from an existing one
    SavePreset {
        name: String,

        /// Preset whose parameters are copied first
        #[arg(long)]
        from: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Parameter to store, e.g. `--set noise=0.3`
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        values: Vec<(ParamKey, f32)>,

        /// User preset directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Delete a user preset
    DeletePreset {
        name: String,

        /// User preset directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Write a config.toml to the user config directory
    InitConfig {
        /// Preset applied on every render
        #[arg(short, long)]
        preset: Option<String>,

        /// Fixed noise seed
        #[arg(long)]
        seed: Option<u64>,

        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn parse_assignment(input: &str) -> std::result::Result<(ParamKey, f32), String> {
    ParameterSet::parse_assignment(input).map_err(|e| e.to_string())
}

fn config_manager() -> Result<ConfigManager> {
    let dir = ConfigManager::default_config_dir().context("No user config directory")?;
    Ok(ConfigManager::new(dir))
}

fn preset_manager(dir: Option<PathBuf>) -> Result<PresetManager> {
    match dir {
        Some(dir) => Ok(PresetManager::new(dir)),
        None => Ok(config_manager()?.presets()),
    }
}

/// Preset, then config file params, then command-line overrides
async fn resolve_params(
    manager: &ConfigManager,
    config: &LofiConfig,
    preset: Option<String>,
    overrides: &[(ParamKey, f32)],
) -> Result<ParameterSet> {
    let mut params = ParameterSet::new();

    if let Some(name) = preset.or_else(|| config.render.preset.clone()) {
        let preset = manager
            .presets()
            .resolve(&name)
            .await
            .with_context(|| format!("Failed to load preset '{}'", name))?;
        info!("Using preset '{}'", name);
        params.merge(&preset.params);
    }

    params.merge(&config.params);
    for &(key, value) in overrides {
        debug!("Override {}={}", key, value);
        params.set(key, value);
    }

    Ok(params)
}

/// Decode, render and encode one file; blocking
fn render_file(input: &Path, output: &Path, params: &ParameterSet, seed: Option<u64>) -> Result<()> {
    let codec = WavCodec::new();
    let (buffer, sample_rate) = codec
        .load(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let chain = EffectsChain::new(params, sample_rate).context("Invalid parameters")?;
    let mut noise = NoiseSource::new(seed);
    let rendered = chain
        .process(buffer, &mut noise, &PhaseVocoder::new())
        .context("Render failed")?;

    codec
        .save(output, &rendered, sample_rate)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

async fn render(
    input: PathBuf,
    output: PathBuf,
    preset: Option<String>,
    config_path: Option<PathBuf>,
    overrides: Vec<(ParamKey, f32)>,
    seed: Option<u64>,
) -> Result<()> {
    let manager = config_manager()?;
    let config = match &config_path {
        Some(path) => LofiConfig::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => manager.load().await,
    };

    let params = resolve_params(&manager, &config, preset, &overrides).await?;
    let seed = seed.or(config.render.seed);

    info!("Rendering {} -> {}", input.display(), output.display());
    let started = Instant::now();

    tokio::task::spawn_blocking(move || render_file(&input, &output, &params, seed))
        .await
        .context("Render task panicked")??;

    info!("Done in {:.2?}", started.elapsed());
    Ok(())
}

async fn list_presets(dir: Option<PathBuf>) -> Result<()> {
    println!("Built-in presets:");
    for preset in builtin_presets() {
        println!("  {:<10} {}", preset.name, preset.description);
    }

    let manager = preset_manager(dir)?;
    let user = manager.list_presets().await?;
    if !user.is_empty() {
        println!("\nUser presets ({}):", manager.preset_dir().display());
        for name in user {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn list_params() {
    println!("{:<16} {:>10}  {:<20} unit", "parameter", "default", "range");
    for key in ParamKey::ALL {
        let range = key.range();
        println!(
            "{:<16} {:>10}  {:<20} {}",
            key.name(),
            key.default_value(),
            format!("{} .. {}", range.start(), range.end()),
            key.unit()
        );
    }
}

async fn show_preset(name: &str, dir: Option<PathBuf>) -> Result<()> {
    let preset = preset_manager(dir)?
        .resolve(name)
        .await
        .with_context(|| format!("Unknown preset '{}'", name))?;
    println!("{}", serde_json::to_string_pretty(&preset)?);
    Ok(())
}

/// Reject values outside a parameter's range before they reach disk
fn check_ranges(params: &ParameterSet) -> Result<()> {
    for key in ParamKey::ALL {
        if let Some(value) = params.explicit(key) {
            let range = key.range();
            if !range.contains(&value) {
                bail!(
                    "{}={} is outside {} .. {}",
                    key,
                    value,
                    range.start(),
                    range.end()
                );
            }
        }
    }
    Ok(())
}

async fn save_preset(
    presets: &PresetManager,
    name: &str,
    from: Option<String>,
    description: Option<String>,
    values: &[(ParamKey, f32)],
) -> Result<Preset> {
    let mut preset = match from {
        Some(base) => presets
            .resolve(&base)
            .await
            .with_context(|| format!("Unknown preset '{}'", base))?,
        None => Preset::default(),
    };

    if let Some(description) = description {
        preset.description = description;
    }
    for &(key, value) in values {
        preset.params.set(key, value);
    }
    check_ranges(&preset.params)?;

    presets
        .save_preset(name, &preset)
        .await
        .with_context(|| format!("Failed to save preset '{}'", name))?;
    println!(
        "Saved preset '{}' to {}",
        name,
        presets.preset_dir().display()
    );
    Ok(preset)
}

async fn delete_preset(presets: &PresetManager, name: &str) -> Result<()> {
    presets
        .delete_preset(name)
        .await
        .with_context(|| format!("Failed to delete preset '{}'", name))?;
    println!("Deleted preset '{}'", name);
    Ok(())
}

async fn init_config(
    manager: &ConfigManager,
    preset: Option<String>,
    seed: Option<u64>,
    force: bool,
) -> Result<LofiConfig> {
    if manager.exists() && !force {
        bail!(
            "{} already exists (use --force to replace it)",
            manager.config_path().display()
        );
    }

    if let Some(name) = &preset {
        manager
            .presets()
            .resolve(name)
            .await
            .with_context(|| format!("Unknown preset '{}'", name))?;
    }

    let mut config = LofiConfig::default();
    config.render.preset = preset;
    config.render.seed = seed;

    manager
        .save(&config)
        .await
        .with_context(|| format!("Failed to write {}", manager.config_path().display()))?;
    println!("Wrote {}", manager.config_path().display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Render {
            input,
            output,
            preset,
            config,
            overrides,
            seed,
        } => render(input, output, preset, config, overrides, seed).await,
        Commands::Presets { dir } => list_presets(dir).await,
        Commands::Params => {
            list_params();
            Ok(())
        }
        Commands::ShowPreset { name, dir } => show_preset(&name, dir).await,
        Commands::SavePreset {
            name,
            from,
            description,
            values,
            dir,
        } => save_preset(&preset_manager(dir)?, &name, from, description, &values)
            .await
            .map(drop),
        Commands::DeletePreset { name, dir } => delete_preset(&preset_manager(dir)?, &name).await,
        Commands::InitConfig {
            preset,
            seed,
            force,
        } => init_config(&config_manager()?, preset, seed, force)
            .await
            .map(drop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "lofi", "-v", "render", "in.wav", "out.wav", "--preset", "tape", "--set",
            "noise=0.3", "-s", "reverb=0.1", "--seed", "9",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Render {
                preset,
                overrides,
                seed,
                ..
            } => {
                assert_eq!(preset.as_deref(), Some("tape"));
                assert_eq!(
                    overrides,
                    vec![(ParamKey::Noise, 0.3), (ParamKey::Reverb, 0.1)]
                );
                assert_eq!(seed, Some(9));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_override() {
        assert!(Cli::try_parse_from(["lofi", "render", "a.wav", "b.wav", "--set", "warp=1"]).is_err());
        assert!(Cli::try_parse_from(["lofi", "render", "a.wav", "b.wav", "--set", "noise"]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_params_layering() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let mut config = LofiConfig::default();
        config.render.preset = Some("tape".to_string());
        config.params.set(ParamKey::Noise, 0.05);

        let params = resolve_params(&manager, &config, None, &[(ParamKey::Reverb, 0.4)])
            .await
            .unwrap();

        // Preset value survives, config overrides preset, CLI adds on top
        assert_eq!(params.get(ParamKey::WowFlutter), 0.5);
        assert_eq!(params.get(ParamKey::Noise), 0.05);
        assert_eq!(params.get(ParamKey::Reverb), 0.4);

        let explicit = resolve_params(&manager, &config, Some("radio".to_string()), &[])
            .await
            .unwrap();
        assert_eq!(explicit.get(ParamKey::StereoWidth), 0.0);
    }

    #[test]
    fn test_cli_parses_preset_management() {
        let cli = Cli::try_parse_from([
            "lofi", "save-preset", "dusty", "--from", "vinyl", "-d", "dusty vinyl", "--set",
            "noise=0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::SavePreset {
                name, from, values, ..
            } => {
                assert_eq!(name, "dusty");
                assert_eq!(from.as_deref(), Some("vinyl"));
                assert_eq!(values, vec![(ParamKey::Noise, 0.5)]);
            }
            _ => panic!("expected save-preset"),
        }

        assert!(matches!(
            Cli::try_parse_from(["lofi", "delete-preset", "dusty"]).unwrap().command,
            Commands::DeletePreset { .. }
        ));
        assert!(matches!(
            Cli::try_parse_from(["lofi", "init-config", "--seed", "3", "--force"])
                .unwrap()
                .command,
            Commands::InitConfig {
                seed: Some(3),
                force: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_save_then_delete_preset() {
        let dir = TempDir::new().unwrap();
        let presets = PresetManager::new(dir.path().to_path_buf());

        let saved = save_preset(
            &presets,
            "dusty",
            Some("vinyl".to_string()),
            Some("dusty vinyl".to_string()),
            &[(ParamKey::Noise, 0.5)],
        )
        .await
        .unwrap();

        // Base preset values carried over, override applied on top
        assert_eq!(saved.params.get(ParamKey::HighpassHz), 60.0);
        assert_eq!(saved.params.get(ParamKey::Noise), 0.5);
        assert_eq!(presets.load_preset("dusty").await.unwrap(), saved);
        assert_eq!(presets.resolve("dusty").await.unwrap().description, "dusty vinyl");

        delete_preset(&presets, "dusty").await.unwrap();
        assert!(!presets.preset_exists("dusty").await);
        assert!(delete_preset(&presets, "dusty").await.is_err());
    }

    #[tokio::test]
    async fn test_save_preset_rejects_out_of_range_and_unknown_base() {
        let dir = TempDir::new().unwrap();
        let presets = PresetManager::new(dir.path().to_path_buf());

        assert!(save_preset(&presets, "loud", None, None, &[(ParamKey::Noise, 3.0)])
            .await
            .is_err());
        assert!(!presets.preset_exists("loud").await);

        assert!(save_preset(&presets, "x", Some("nope".to_string()), None, &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_init_config_writes_and_respects_force() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        init_config(&manager, Some("tape".to_string()), Some(9), false)
            .await
            .unwrap();
        let loaded = manager.load().await;
        assert_eq!(loaded.render.preset.as_deref(), Some("tape"));
        assert_eq!(loaded.render.seed, Some(9));

        assert!(init_config(&manager, None, None, false).await.is_err());

        init_config(&manager, None, None, true).await.unwrap();
        assert_eq!(manager.load().await, LofiConfig::default());

        assert!(init_config(&manager, Some("nope".to_string()), None, true)
            .await
            .is_err());
    }
}
