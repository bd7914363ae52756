//! Criterion benchmarks for whole-chain rendering
//!
//! Measures:
//! - Default chain (band-limit and limiter only)
//! - Every built-in preset on the same input
//! - Input length sensitivity for a heavy preset

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lofi_core::domain::{builtin_preset, builtin_presets, EffectsChain, NoiseSource, ParameterSet, SampleRate};
use lofi_infra::PhaseVocoder;
use std::hint::black_box;

use bench_helpers::{stereo_tone, SAMPLE_RATE};

fn bench_default_chain(c: &mut Criterion) {
    let chain = EffectsChain::new(&ParameterSet::new(), SampleRate::HZ_44100).unwrap();
    let vocoder = PhaseVocoder::new();
    let input = stereo_tone(1.0);

    c.bench_function("default_chain_1s", |b| {
        b.iter(|| {
            let mut noise = NoiseSource::seeded(0);
            black_box(chain.process(black_box(input.clone()), &mut noise, &vocoder).unwrap())
        })
    });
}

fn bench_presets(c: &mut Criterion) {
    let mut group = c.benchmark_group("preset_1s");
    group.sample_size(10);

    let vocoder = PhaseVocoder::new();
    let input = stereo_tone(1.0);
    group.throughput(Throughput::Elements(input.num_frames() as u64));

    for preset in builtin_presets() {
        let chain = EffectsChain::new(&preset.params(), SampleRate::HZ_44100).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(preset.name), &chain, |b, chain| {
            b.iter(|| {
                let mut noise = NoiseSource::seeded(0);
                black_box(chain.process(input.clone(), &mut noise, &vocoder).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_input_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("chillhop_length");
    group.sample_size(10);

    let vocoder = PhaseVocoder::new();
    let params = builtin_preset("chillhop").unwrap().params();
    let chain = EffectsChain::new(&params, SampleRate::HZ_44100).unwrap();

    for seconds in [0.5_f32, 1.0, 2.0, 4.0] {
        let input = stereo_tone(seconds);
        group.throughput(Throughput::Elements((SAMPLE_RATE as f32 * seconds) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(seconds), &input, |b, input| {
            b.iter(|| {
                let mut noise = NoiseSource::seeded(0);
                black_box(chain.process(input.clone(), &mut noise, &vocoder).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_default_chain, bench_presets, bench_input_length);
criterion_main!(benches);
