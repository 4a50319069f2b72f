//! Verification demo: train raw and calibrated quantizers on synthetic
//! identities and compare how well their scores separate matches from
//! non-matches.
//!
//! Run with: cargo run --release --example verification
//! Set RUST_LOG=forge_pq=debug to see per-subspace training logs.

use std::sync::Arc;
use std::time::Instant;

use forge_pq::{
    binarize, pack_high_nibbles, LabeledDataset, ProductQuantizer, QuantizedCode, QuantizerConfig,
    QuantizerRegistry, ScalarQuantizer,
};

const CLASSES: usize = 20;
const PER_CLASS: usize = 30;
const DIM: usize = 32;

fn main() -> forge_pq::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_pq=info".into()),
        )
        .init();

    println!("=== Product-Quantized Verification Demo ===\n");

    let train = LabeledDataset::generate_clustered(CLASSES, PER_CLASS, DIM, 0.35, 1);
    let probe = LabeledDataset::generate_clustered(CLASSES, 5, DIM, 0.35, 1);
    println!(
        "Training set: {} samples, {} identities, {} dimensions",
        train.len(),
        CLASSES,
        DIM
    );

    let registry = Arc::new(QuantizerRegistry::new());

    for calibrate in [false, true] {
        let label = if calibrate { "calibrated" } else { "raw" };
        println!("\n--- {} tables ---", label);

        let mut pq = ProductQuantizer::new(
            QuantizerConfig::default().with_calibration(calibrate),
            Arc::clone(&registry),
        );

        let start = Instant::now();
        pq.train(&train.samples)?;
        println!("Trained {} subspaces in {:.2?}", pq.num_subspaces().unwrap_or(0), start.elapsed());

        let codes: Vec<QuantizedCode> = pq.encode_batch(
            &probe.samples.iter().map(|s| s.data.to_vec()).collect::<Vec<_>>(),
        )?;
        let evaluator = pq.evaluator()?;

        let mut genuine = Vec::new();
        let mut impostor = Vec::new();
        for i in 0..codes.len() {
            for j in (i + 1)..codes.len() {
                let score = evaluator.compare(&codes[i], &codes[j])?;
                if probe.samples[i].label == probe.samples[j].label {
                    genuine.push(score);
                } else {
                    impostor.push(score);
                }
            }
        }

        let mean = |v: &[f32]| v.iter().map(|&s| s as f64).sum::<f64>() / v.len().max(1) as f64;
        println!("Genuine pairs:  {:>6}  mean score {:>10.4}", genuine.len(), mean(&genuine));
        println!("Impostor pairs: {:>6}  mean score {:>10.4}", impostor.len(), mean(&impostor));

        // Fraction of genuine/impostor pairs ranked correctly
        let mut ordered = 0u64;
        for g in &genuine {
            ordered += impostor.iter().filter(|&&i| g > &i).count() as u64;
        }
        let auc = ordered as f64 / (genuine.len() * impostor.len()).max(1) as f64;
        println!("Pairwise ordering (AUC): {:.4}", auc);

        let bytes = pq.serialize()?;
        println!(
            "Serialized quantizer: {:.1} KiB, template: {} bytes (from {} floats)",
            bytes.len() as f64 / 1024.0,
            codes[0].len(),
            DIM
        );
    }

    println!("\n=== Scalar Codecs ===\n");

    let sq = ScalarQuantizer::train(&train.samples)?;
    let v = &probe.samples[0].data;
    let bytes = sq.quantize(v);
    println!("Byte-quantized: {} bytes (a = {:.3}, b = {:.3})", bytes.len(), sq.a, sq.b);
    println!("Nibble-packed:  {} bytes", pack_high_nibbles(&bytes)?.len());
    println!("Sign bits:      {} bytes", binarize(v)?.len());

    Ok(())
}
