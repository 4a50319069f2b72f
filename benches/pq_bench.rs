//! Benchmarks for quantizer training, encoding and code comparison.
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forge_pq::{LabeledDataset, ProductQuantizer, QuantizedCode, QuantizerConfig, QuantizerRegistry};

fn trained(dim: usize, calibrate: bool) -> (ProductQuantizer, LabeledDataset) {
    let data = LabeledDataset::generate_clustered(10, 100, dim, 0.3, 42);
    let mut pq = ProductQuantizer::new(
        QuantizerConfig::default().with_calibration(calibrate),
        Arc::new(QuantizerRegistry::new()),
    );
    pq.train(&data.samples).expect("training failed");
    (pq, data)
}

fn benchmark_train(c: &mut Criterion) {
    let data = LabeledDataset::generate_clustered(10, 100, 32, 0.3, 42);
    let registry = Arc::new(QuantizerRegistry::new());

    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for (name, config) in [
        ("sequential", QuantizerConfig::default().with_parallel(false)),
        ("parallel", QuantizerConfig::default()),
        ("calibrated", QuantizerConfig::default().with_calibration(true)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut pq = ProductQuantizer::new(config.clone(), Arc::clone(&registry));
                pq.train(black_box(&data.samples)).expect("training failed");
                pq
            })
        });
    }
    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for dim in [16, 64, 128] {
        let (pq, data) = trained(dim, false);
        let v = &data.samples[0].data;

        group.bench_with_input(BenchmarkId::new("single", dim), &dim, |b, _| {
            b.iter(|| pq.encode(black_box(v)).expect("encode failed"))
        });
    }

    let (pq, data) = trained(64, false);
    let vectors: Vec<Vec<f32>> = data.samples.iter().map(|s| s.data.to_vec()).collect();
    group.bench_function("batch_1000_64d", |b| {
        b.iter(|| pq.encode_batch(black_box(&vectors)).expect("encode failed"))
    });

    group.finish();
}

fn benchmark_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    for calibrate in [false, true] {
        let (pq, data) = trained(64, calibrate);
        let evaluator = pq.evaluator().expect("not trained");
        let codes: Vec<QuantizedCode> = data
            .samples
            .iter()
            .map(|s| pq.encode(&s.data).expect("encode failed"))
            .collect();
        let name = if calibrate { "calibrated" } else { "raw" };

        group.bench_function(format!("evaluator_{}", name), |b| {
            b.iter(|| {
                evaluator
                    .compare(black_box(&codes[0]), black_box(&codes[1]))
                    .expect("compare failed")
            })
        });

        // One probe against the whole gallery
        group.bench_function(format!("gallery_1000_{}", name), |b| {
            b.iter(|| {
                let best = codes
                    .iter()
                    .filter_map(|c| evaluator.compare(&codes[0], c).ok())
                    .fold(f32::NEG_INFINITY, f32::max);
                black_box(best)
            })
        });

        group.bench_function(format!("registry_{}", name), |b| {
            b.iter(|| {
                pq.registry()
                    .compare(pq.id(), black_box(&codes[0]), black_box(&codes[1]))
                    .expect("compare failed")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_train, benchmark_encode, benchmark_compare);
criterion_main!(benches);
