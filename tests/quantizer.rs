//! End-to-end tests: train, encode, compare, persist.
//!
//! Run with: cargo test

use std::sync::{Arc, OnceLock};

use forge_pq::{
    DistanceMetric, ForgePqError, LabeledDataset, Population, ProductQuantizer, QuantizedCode,
    QuantizerConfig, QuantizerRegistry, Sample,
};
use proptest::prelude::*;

fn train(config: QuantizerConfig, data: &LabeledDataset) -> (ProductQuantizer, Arc<QuantizerRegistry>) {
    let registry = Arc::new(QuantizerRegistry::new());
    let mut pq = ProductQuantizer::new(config, Arc::clone(&registry));
    pq.train(&data.samples).unwrap();
    (pq, registry)
}

/// Mean score of same-label pairs and of different-label pairs.
fn population_means(pq: &ProductQuantizer, data: &LabeledDataset) -> (f64, f64) {
    let codes: Vec<QuantizedCode> = data.samples.iter().map(|s| pq.encode(&s.data).unwrap()).collect();

    let (mut genuine, mut n_genuine) = (0.0f64, 0usize);
    let (mut impostor, mut n_impostor) = (0.0f64, 0usize);
    for i in 0..codes.len() {
        for j in (i + 1)..codes.len() {
            let s = pq.compare(&codes[i], &codes[j]).unwrap() as f64;
            if data.samples[i].label == data.samples[j].label {
                genuine += s;
                n_genuine += 1;
            } else {
                impostor += s;
                n_impostor += 1;
            }
        }
    }
    (genuine / n_genuine as f64, impostor / n_impostor as f64)
}

#[test]
fn test_two_class_scores_separate() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.2, 11);
    let (pq, _) = train(QuantizerConfig::default(), &data);

    let code = pq.encode(&data.samples[0].data).unwrap();
    assert_eq!(code.len(), 2);

    let (genuine, impostor) = population_means(&pq, &data);
    assert!(
        genuine > impostor,
        "genuine mean {} should exceed impostor mean {}",
        genuine,
        impostor
    );
}

#[test]
fn test_calibrated_scores_separate() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.2, 11);
    let (pq, registry) = train(QuantizerConfig::default().with_calibration(true), &data);

    let entry = registry.get(pq.id()).unwrap();
    assert!(entry.is_calibrated());
    for table in entry.tables() {
        assert!(table.values().iter().all(|v| v.is_finite()));
    }
    for state in entry.calibration().unwrap() {
        assert!(state.genuine_bandwidth > 0.0);
        assert!(state.impostor_bandwidth > 0.0);
    }

    let (genuine, impostor) = population_means(&pq, &data);
    assert!(genuine > impostor);
}

#[test]
fn test_dimension_not_divisible() {
    let samples: Vec<Sample> = (0..300)
        .map(|i| Sample::new(i % 2, vec![i as f32; 5]))
        .collect();
    let mut pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::new(QuantizerRegistry::new()));

    assert!(matches!(
        pq.train(&samples),
        Err(ForgePqError::DimensionNotDivisible { dim: 5, width: 2 })
    ));
}

#[test]
fn test_single_class_cannot_calibrate() {
    let data = LabeledDataset::generate_clustered(1, 300, 4, 0.5, 3);
    let registry = Arc::new(QuantizerRegistry::new());
    let mut pq = ProductQuantizer::new(
        QuantizerConfig::default().with_calibration(true),
        Arc::clone(&registry),
    );

    assert!(matches!(
        pq.train(&data.samples),
        Err(ForgePqError::EmptyPopulation(Population::Impostor))
    ));
    assert!(registry.is_empty());

    // Without calibration the same data trains fine.
    let mut raw = ProductQuantizer::new(QuantizerConfig::default(), registry);
    assert!(raw.train(&data.samples).is_ok());
}

#[test]
fn test_encode_before_train() {
    let pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::new(QuantizerRegistry::new()));
    assert!(matches!(pq.encode(&[0.0; 4]), Err(ForgePqError::NotTrained)));
}

#[test]
fn test_compare_with_foreign_code_length() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.5, 8);
    let (pq, _) = train(QuantizerConfig::default(), &data);

    assert!(matches!(
        pq.compare(&[0, 1], &[0, 1, 2]),
        Err(ForgePqError::CodeLengthMismatch {
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn test_raw_self_score_is_zero() {
    let data = LabeledDataset::generate_clustered(3, 100, 6, 0.5, 4);
    let (pq, _) = train(QuantizerConfig::default(), &data);

    for s in data.samples.iter().take(25) {
        let code = pq.encode(&s.data).unwrap();
        assert_eq!(pq.compare(&code, &code).unwrap(), 0.0);
    }
}

#[test]
fn test_serialize_roundtrip() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 5);

    for calibrate in [false, true] {
        let (pq, _) = train(QuantizerConfig::default().with_calibration(calibrate), &data);
        let bytes = pq.serialize().unwrap();

        let other_registry = Arc::new(QuantizerRegistry::new());
        let restored = ProductQuantizer::deserialize(&bytes, Arc::clone(&other_registry)).unwrap();
        assert_eq!(restored.id(), pq.id());
        assert_eq!(restored.config(), pq.config());
        assert!(other_registry.contains(pq.id()));

        let a = &data.samples[0].data;
        let b = &data.samples[1].data;
        let (ca, cb) = (pq.encode(a).unwrap(), pq.encode(b).unwrap());
        assert_eq!(restored.encode(a).unwrap(), ca);
        assert_eq!(restored.encode(b).unwrap(), cb);
        assert_eq!(
            restored.compare(&ca, &cb).unwrap(),
            pq.compare(&ca, &cb).unwrap()
        );
    }
}

#[test]
fn test_corrupted_blob_rejected() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 5);
    let (pq, registry) = train(QuantizerConfig::default(), &data);

    let mut bytes = pq.serialize().unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x55;
    assert!(matches!(
        ProductQuantizer::deserialize(&bytes, registry),
        Err(ForgePqError::ChecksumMismatch)
    ));
}

#[test]
fn test_restore_into_same_registry_survives_original_drop() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 6);
    let registry = Arc::new(QuantizerRegistry::new());

    let mut original = ProductQuantizer::new(QuantizerConfig::default(), Arc::clone(&registry));
    original.train(&data.samples).unwrap();
    let first_version = original.entry().unwrap().version();

    let restored = ProductQuantizer::deserialize(&original.serialize().unwrap(), Arc::clone(&registry)).unwrap();
    assert!(restored.entry().unwrap().version() > first_version);

    drop(original);
    assert!(registry.contains(restored.id()));

    let code = restored.encode(&data.samples[0].data).unwrap();
    assert_eq!(restored.compare(&code, &code).unwrap(), 0.0);
}

#[test]
fn test_original_keeps_scoring_after_restored_copy_drops() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 6);
    let registry = Arc::new(QuantizerRegistry::new());

    let mut original = ProductQuantizer::new(QuantizerConfig::default(), Arc::clone(&registry));
    original.train(&data.samples).unwrap();
    let code = original.encode(&data.samples[0].data).unwrap();
    let other = original.encode(&data.samples[1].data).unwrap();
    let expected = original.compare(&code, &other).unwrap();

    let restored = ProductQuantizer::deserialize(&original.serialize().unwrap(), Arc::clone(&registry)).unwrap();
    assert_eq!(registry.holder_count(original.id()), 2);
    drop(restored);

    assert!(registry.contains(original.id()));
    assert_eq!(registry.holder_count(original.id()), 1);
    assert_eq!(original.compare(&code, &code).unwrap(), 0.0);
    assert_eq!(original.compare(&code, &other).unwrap(), expected);

    let id = original.id();
    drop(original);
    assert!(!registry.contains(id));
}

#[test]
fn test_save_and_load() {
    let data = LabeledDataset::generate_clustered(2, 150, 6, 0.3, 9);
    let (pq, _) = train(QuantizerConfig::default().with_calibration(true), &data);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.fpq");
    pq.save(&path).unwrap();

    let loaded = ProductQuantizer::load(&path, Arc::new(QuantizerRegistry::new())).unwrap();
    assert_eq!(loaded.num_subspaces(), Some(3));
    assert_eq!(loaded.codebooks(), pq.codebooks());
    assert_eq!(
        loaded.entry().unwrap().tables(),
        pq.entry().unwrap().tables()
    );
}

#[test]
fn test_same_seed_same_tables() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.4, 12);
    let config = QuantizerConfig::default().with_seed(7);

    let (a, _) = train(config.clone(), &data);
    let (b, _) = train(config, &data);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.codebooks(), b.codebooks());
    assert_eq!(a.entry().unwrap().tables(), b.entry().unwrap().tables());
}

#[test]
fn test_thread_count_does_not_change_result() {
    let data = LabeledDataset::generate_clustered(2, 150, 8, 0.4, 13);

    let (seq, _) = train(QuantizerConfig::default().with_parallel(false), &data);
    let (one, _) = train(QuantizerConfig::default().with_num_threads(1), &data);
    let (four, _) = train(QuantizerConfig::default().with_num_threads(4), &data);

    assert_eq!(seq.codebooks(), one.codebooks());
    assert_eq!(seq.codebooks(), four.codebooks());
    assert_eq!(seq.entry().unwrap().tables(), four.entry().unwrap().tables());
}

#[test]
fn test_pinned_evaluator_survives_retrain() {
    let first = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 1);
    let second = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 2);
    let registry = Arc::new(QuantizerRegistry::new());

    let mut pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::clone(&registry));
    pq.train(&first.samples).unwrap();
    let pinned = pq.evaluator().unwrap();

    let (a, b) = ([3u8, 200], [90u8, 17]);
    let before = pinned.compare(&a, &b).unwrap();

    pq.train(&second.samples).unwrap();
    assert_eq!(pinned.compare(&a, &b).unwrap(), before);
    assert!(registry.get(pq.id()).unwrap().version() > pinned.version());
}

#[test]
fn test_concurrent_compare() {
    let data = LabeledDataset::generate_clustered(2, 150, 4, 0.3, 14);
    let (pq, registry) = train(QuantizerConfig::default().with_metric(DistanceMetric::Manhattan), &data);
    let id = pq.id();
    let codes: Vec<QuantizedCode> = data.samples.iter().take(10).map(|s| pq.encode(&s.data).unwrap()).collect();
    let expected: Vec<f32> = codes.iter().map(|c| pq.compare(c, &codes[0]).unwrap()).collect();
    let codes = Arc::new(codes);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let codes = Arc::clone(&codes);
            std::thread::spawn(move || {
                codes
                    .iter()
                    .map(|c| registry.compare(id, c, &codes[0]).unwrap())
                    .collect::<Vec<f32>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

fn shared_quantizer() -> &'static ProductQuantizer {
    static PQ: OnceLock<ProductQuantizer> = OnceLock::new();
    PQ.get_or_init(|| {
        let data = LabeledDataset::generate_clustered(4, 80, 8, 0.5, 77);
        let mut pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::new(QuantizerRegistry::new()));
        pq.train(&data.samples).unwrap();
        pq
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_encode_has_one_byte_per_subspace(v in prop::collection::vec(-10.0f32..10.0, 8)) {
        let pq = shared_quantizer();
        let code = pq.encode(&v).unwrap();
        prop_assert_eq!(code.len(), 4);
    }

    #[test]
    fn prop_raw_scores_are_non_positive(
        a in prop::collection::vec(any::<u8>(), 4),
        b in prop::collection::vec(any::<u8>(), 4),
    ) {
        let pq = shared_quantizer();
        let s = pq.compare(&a, &b).unwrap();
        prop_assert!(s <= 0.0);
        prop_assert_eq!(s, pq.compare(&b, &a).unwrap());
    }
}
