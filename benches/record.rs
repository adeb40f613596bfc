use criterion::BenchmarkId;
use criterion::Throughput;
use criterion::{criterion_group, criterion_main, Criterion};
use hdr_histogram_core::Histogram;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn record_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("Histogram/record_value");

    for sig_figs in 1..=5 {
        let histogram = Histogram::new(1, 3_600_000_000_000, sig_figs).unwrap();
        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("min/sig_figs", sig_figs), |b| {
            b.iter(|| histogram.record_value(1))
        });
        group.bench_function(BenchmarkId::new("max/sig_figs", sig_figs), |b| {
            b.iter(|| histogram.record_value(3_599_999_999_999))
        });
    }
}

fn record_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("Histogram/record_values");

    for sig_figs in 1..=5 {
        let histogram = Histogram::new(1, 3_600_000_000_000, sig_figs).unwrap();
        group.bench_function(BenchmarkId::new("batch_of_100/sig_figs", sig_figs), |b| {
            b.iter(|| histogram.record_values(1_234_567, 100))
        });
    }
}

fn record_corrected_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("Histogram/record_corrected_value");

    for expected_interval in [10u64, 100, 1_000] {
        let histogram = Histogram::new(1, 3_600_000_000_000, 3).unwrap();
        group.bench_function(
            BenchmarkId::new("value_1e6/expected_interval", expected_interval),
            |b| b.iter(|| histogram.record_corrected_value(1_000_000, expected_interval)),
        );
    }
}

fn record_precalculated_random_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("Histogram/record_precalculated_random_values");

    let histogram = Histogram::new(1, 3_600_000_000_000, 3).unwrap();
    let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
    // Skewed toward the low end of the range, the way real latencies cluster,
    // with an occasional value out near the ceiling to exercise the top buckets.
    let low = Uniform::from(1..1_000_000u64);
    let high = Uniform::from(1_000_000..3_600_000_000_000u64);
    let values: Vec<u64> = (0..100_000)
        .map(|_| {
            if rng.gen_bool(0.99) {
                low.sample(&mut rng)
            } else {
                high.sample(&mut rng)
            }
        })
        .collect();

    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("skewed_distribution", |b| {
        b.iter(|| {
            for v in &values {
                histogram.record_value(*v);
            }
        })
    });
}

fn add(c: &mut Criterion) {
    use hdr_histogram_core::merge;

    let mut group = c.benchmark_group("Histogram/merge_add");

    for sig_figs in [1u8, 3, 5] {
        let dst = Histogram::new(1, 3_600_000_000_000, sig_figs).unwrap();
        let src = Histogram::new(1, 3_600_000_000_000, sig_figs).unwrap();
        for v in 1..=1_000u64 {
            src.record_value(v * 1_000);
        }
        group.bench_function(BenchmarkId::new("1000_cells/sig_figs", sig_figs), |b| {
            b.iter(|| merge::add(&dst, &src))
        });
    }
}

criterion_group!(
    benches,
    record_value,
    record_values,
    record_corrected_value,
    record_precalculated_random_values,
    add
);
criterion_main!(benches);
