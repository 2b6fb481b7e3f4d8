//! Benchmarks for the cleaning pipeline stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eeg_core::Signal;
use eeg_processing::{
    ArtefactDetector, ArtefactSeparator, CleaningPipeline, FilterBank, FilterSpec, PipelineEvaluator,
};
use eeg_simulation::{EegSimConfig, EegSimulator};

fn recording(channels: usize, duration: f64) -> Signal {
    let config = EegSimConfig {
        channel_count: channels,
        duration,
        ..EegSimConfig::blink_scenario()
    };
    EegSimulator::new(config).unwrap().generate().unwrap()
}

fn bench_filter_bank(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_bank");
    let spec = FilterSpec::default();

    for &channels in &[1, 4, 16] {
        let signal = recording(channels, 10.0);
        group.bench_with_input(BenchmarkId::new("apply", format!("{}ch_10s", channels)), &signal, |b, signal| {
            b.iter(|| black_box(FilterBank::apply(black_box(signal), &spec).unwrap()))
        });
    }

    group.finish();
}

fn bench_separation(c: &mut Criterion) {
    let mut group = c.benchmark_group("separation");
    group.sample_size(20);

    for &channels in &[2, 4, 8] {
        let signal = FilterBank::apply(&recording(channels, 10.0), &FilterSpec::default()).unwrap();
        let separator = ArtefactSeparator::default();
        group.bench_with_input(BenchmarkId::new("fastica", format!("{}ch", channels)), &signal, |b, signal| {
            b.iter(|| black_box(separator.separate_and_clean(black_box(signal), channels)))
        });
    }

    group.finish();
}

fn bench_pipeline_and_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);

    let raw = recording(4, 10.0);
    let pipeline = CleaningPipeline::default();
    let spec = FilterSpec::default();

    group.bench_function("run_4ch_10s", |b| {
        b.iter(|| black_box(pipeline.run(black_box(&raw), &spec).unwrap()))
    });

    let (current, timings) = pipeline.run(&raw, &spec).unwrap();
    let evaluator = PipelineEvaluator::default();
    group.bench_function("evaluate_4ch_10s", |b| {
        b.iter(|| black_box(evaluator.evaluate(black_box(&raw), &current, &timings).unwrap()))
    });

    let detector = ArtefactDetector::default();
    group.bench_function("detect_4ch_10s", |b| b.iter(|| black_box(detector.detect(black_box(&raw)).unwrap())));

    group.finish();
}

criterion_group!(benches, bench_filter_bank, bench_separation, bench_pipeline_and_evaluation);
criterion_main!(benches);
