//! Benchmarks for the local reducer, the coordinator's summary and one
//! message size of a local ring.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ring_latency::aggregate::summarize;
use ring_latency::benchmark::BenchmarkRunner;
use ring_latency::cli::Settings;
use ring_latency::metrics::{SampleSet, StatVector};
use ring_latency::substrate::LocalUniverse;
use ring_latency::RoundTripMode;

fn random_samples(trials: usize) -> SampleSet {
    let mut rng = StdRng::seed_from_u64(42);
    let mut channel = || -> Vec<f64> { (0..trials).map(|_| rng.gen_range(1e-7..1e-4)).collect() };
    SampleSet {
        send: channel(),
        recv: channel(),
        probe: channel(),
    }
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_reduce");
    for trials in [10usize, 1_000, 100_000] {
        let samples = random_samples(trials);
        group.bench_with_input(BenchmarkId::from_parameter(trials), &samples, |b, s| {
            b.iter(|| black_box(s.clone().reduce()));
        });
    }
    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let stats: Vec<StatVector> = (0..256).map(|_| random_samples(10).reduce()).collect();
    c.bench_function("summarize_256_ranks", |b| {
        b.iter(|| black_box(summarize(1024, black_box(&stats))));
    });
}

fn bench_ring_size(c: &mut Criterion) {
    let runner = BenchmarkRunner::new(Settings {
        mode: RoundTripMode::RoundTrip,
        ranks: 2,
        trials: 100,
        ..Settings::default()
    });

    let mut group = c.benchmark_group("local_ring_100_trials");
    group.sample_size(20);
    for size in [16usize, 1024, 16384] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                LocalUniverse::new(2)
                    .unwrap()
                    .launch(false, |mut comm| {
                        let mut rng = StdRng::seed_from_u64(42);
                        Ok(runner.run_size(&mut comm, size, &mut rng)?)
                    })
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reduce, bench_summarize, bench_ring_size);
criterion_main!(benches);
