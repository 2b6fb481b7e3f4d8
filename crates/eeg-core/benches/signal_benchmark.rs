//! Benchmarks for signal construction, statistics and persistence

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eeg_core::{load, persist, stats, ChannelStats, Moments, Signal};

fn sine_channels(channels: usize, samples: usize) -> Vec<Vec<f64>> {
    (0..channels)
        .map(|ch| {
            (0..samples)
                .map(|i| 20.0 * (i as f64 * 0.05 + ch as f64).sin())
                .collect()
        })
        .collect()
}

/// Benchmark validated signal construction
fn bench_signal_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_load");

    for &channels in &[1, 8, 32] {
        let rows = sine_channels(channels, 2560);
        group.bench_with_input(
            BenchmarkId::new("from_channels", format!("{}ch_2560", channels)),
            &rows,
            |b, rows| {
                b.iter(|| {
                    let signal = load(black_box(rows.clone()), black_box(256.0));
                    black_box(signal)
                });
            },
        );
    }

    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");
    let data: Vec<f64> = sine_channels(1, 16_384).remove(0);

    group.bench_function("channel_stats", |b| {
        b.iter(|| black_box(ChannelStats::calculate(black_box(&data))))
    });
    group.bench_function("moments", |b| {
        b.iter(|| black_box(Moments::calculate(black_box(&data))))
    });
    group.bench_function("median", |b| b.iter(|| black_box(stats::median(black_box(&data)))));

    group.finish();
}

fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("persistence");
    let signal = Signal::from_channels(sine_channels(4, 2560), 256.0).unwrap();

    group.bench_function("npy_encode", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(signal.len() * 8 + 128);
            persist::write_npy_to(black_box(&signal), &mut out).unwrap();
            black_box(out)
        });
    });
    group.bench_function("csv_encode", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            persist::write_csv_to(black_box(&signal), &mut out).unwrap();
            black_box(out)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_signal_load, bench_statistics, bench_persistence);
criterion_main!(benches);
