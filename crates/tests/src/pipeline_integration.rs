//! Integration tests for the render pipeline
//!
//! These run real WAV files through the full chain with the phase
//! vocoder plugged in as the time-scale capability.

use lofi_core::domain::{
    builtin_presets, AudioBuffer, AudioCodec, AudioError, ConfigManager, EffectsChain, LofiConfig,
    NoiseSource, ParamKey, ParameterSet, Preset, SampleRate, Stage,
};
use lofi_infra::{PhaseVocoder, WavCodec};
use std::f32::consts::PI;
use tempfile::TempDir;

const SR: u32 = 44100;

fn generate_sine_wave(frequency: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (2.0 * PI * frequency * i as f32 / SR as f32).sin() * 0.5)
        .collect()
}

fn stereo_tone(frames: usize) -> AudioBuffer {
    AudioBuffer::new(vec![
        generate_sine_wave(220.0, frames),
        generate_sine_wave(330.0, frames),
    ])
    .unwrap()
}

fn render(buffer: AudioBuffer, params: &ParameterSet, seed: u64) -> AudioBuffer {
    let chain = EffectsChain::new(params, SampleRate::HZ_44100).unwrap();
    let mut noise = NoiseSource::seeded(seed);
    chain.process(buffer, &mut noise, &PhaseVocoder::new()).unwrap()
}

// ============================================================================
// FILE ROUND TRIP
// ============================================================================

#[test]
fn test_wav_through_chain_to_wav() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");

    WavCodec
        .save(&input, &stereo_tone(SR as usize / 2), SampleRate::HZ_44100)
        .unwrap();

    let (buffer, sample_rate) = WavCodec.load(&input).unwrap();
    let params = ParameterSet::new()
        .with(ParamKey::Saturation, 0.5)
        .with(ParamKey::Noise, 0.2)
        .with(ParamKey::Reverb, 0.2);
    let chain = EffectsChain::new(&params, sample_rate).unwrap();
    let rendered = chain
        .process(buffer, &mut NoiseSource::seeded(1), &PhaseVocoder::new())
        .unwrap();
    WavCodec.save(&output, &rendered, sample_rate).unwrap();

    let (reloaded, reloaded_rate) = WavCodec.load(&output).unwrap();
    assert_eq!(reloaded_rate, SampleRate::HZ_44100);
    assert_eq!(reloaded, rendered);
    assert_eq!(reloaded.num_frames(), SR as usize / 2);
    assert!(reloaded.is_finite());
    assert!(reloaded.peak() <= 0.95 + 1e-6);
}

// ============================================================================
// PRESETS
// ============================================================================

#[test]
fn test_every_builtin_preset_renders() {
    for preset in builtin_presets() {
        let params = preset.params();
        let input = stereo_tone(SR as usize / 4);
        let input_frames = input.num_frames();

        let rendered = render(input, &params, 5);

        assert_eq!(rendered.num_channels(), 2, "preset {}", preset.name);
        assert!(rendered.is_finite(), "preset {}", preset.name);
        assert!(rendered.peak() <= 0.95 + 1e-6, "preset {}", preset.name);

        let rate = params.get(ParamKey::TimeStretch);
        let expected = (input_frames as f32 / rate).round() as usize;
        assert!(
            rendered.num_frames().abs_diff(expected) <= 1,
            "preset {}: {} frames, expected about {}",
            preset.name,
            rendered.num_frames(),
            expected
        );
    }
}

#[tokio::test]
async fn test_user_preset_round_trip_renders_like_builtin() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());
    let presets = manager.presets();

    let tape = builtin_presets()
        .iter()
        .find(|p| p.name == "tape")
        .unwrap()
        .to_preset();
    presets.save_preset("my-tape", &tape).await.unwrap();

    let loaded: Preset = presets.resolve("my-tape").await.unwrap();
    assert_eq!(loaded, tape);

    let a = render(stereo_tone(8192), &tape.params, 11);
    let b = render(stereo_tone(8192), &loaded.params, 11);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_config_file_drives_render() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());

    let mut config = LofiConfig::default();
    config.render.seed = Some(42);
    config.params.set(ParamKey::Noise, 0.3);
    manager.save(&config).await.unwrap();

    let loaded = manager.load().await;
    assert_eq!(loaded.render.seed, Some(42));

    let chain = EffectsChain::new(&loaded.params, SampleRate::HZ_44100).unwrap();
    assert!(chain.active_stages().contains(&Stage::Noise));
}

// ============================================================================
// TIME SCALE
// ============================================================================

#[test]
fn test_time_stretch_changes_length() {
    let params = ParameterSet::new().with(ParamKey::TimeStretch, 0.5);
    let rendered = render(stereo_tone(SR as usize / 2), &params, 0);

    assert_eq!(rendered.num_frames(), SR as usize);
    assert_eq!(rendered.num_channels(), 2);
}

#[test]
fn test_pitch_shift_keeps_length() {
    let params = ParameterSet::new().with(ParamKey::PitchShift, 3.0);
    let input = stereo_tone(SR as usize / 2);
    let frames = input.num_frames();

    let rendered = render(input, &params, 0);
    assert_eq!(rendered.num_frames(), frames);
}

// ============================================================================
// DETERMINISM AND ERRORS
// ============================================================================

#[test]
fn test_seed_controls_noise() {
    let params = ParameterSet::new().with(ParamKey::Noise, 0.5);

    let a = render(stereo_tone(4096), &params, 3);
    let b = render(stereo_tone(4096), &params, 3);
    let c = render(stereo_tone(4096), &params, 4);

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_silence_in_silence_out() {
    let params = ParameterSet::new()
        .with(ParamKey::Saturation, 1.0)
        .with(ParamKey::Compression, 1.0)
        .with(ParamKey::Reverb, 0.5);

    let rendered = render(AudioBuffer::silence(2, 2048).unwrap(), &params, 0);
    assert_eq!(rendered.peak(), 0.0);
}

#[test]
fn test_out_of_range_parameter_rejected() {
    let params = ParameterSet::new().with(ParamKey::Noise, 1.5);
    let result = EffectsChain::new(&params, SampleRate::HZ_44100);

    assert!(matches!(
        result,
        Err(AudioError::InvalidParameter { ref name, .. }) if name == "noise"
    ));
}
