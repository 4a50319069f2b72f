//! Likelihood-ratio calibration of lookup tables.
//!
//! A raw lookup table answers "how far apart are these two centers". After
//! calibration it answers "how much more likely is this distance between two
//! samples of the same class than between samples of different classes",
//! as `ln(f_genuine(d) / f_impostor(d))` with both densities estimated by a
//! Gaussian kernel over the training pairs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::calibration::{MIN_BANDWIDTH, SAMPLE_CAP};
use crate::error::{ForgePqError, Population, Result};
use crate::lut::LookupTable;

/// Kernel bandwidths chosen for one calibrated subspace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Bandwidth of the genuine (same class) score density.
    pub genuine_bandwidth: f64,
    /// Bandwidth of the impostor (different class) score density.
    pub impostor_bandwidth: f64,
}

/// Number of genuine and impostor pairs among `labels`.
pub fn pair_counts(labels: &[i32]) -> (u64, u64) {
    let mut per_class: HashMap<i32, u64> = HashMap::new();
    for &label in labels {
        *per_class.entry(label).or_default() += 1;
    }

    let n = labels.len() as u64;
    let total = n * n.saturating_sub(1) / 2;
    let genuine: u64 = per_class.values().map(|&c| c * c.saturating_sub(1) / 2).sum();
    (genuine, total - genuine)
}

/// Fail unless both genuine and impostor pairs exist.
pub fn ensure_populations(labels: &[i32]) -> Result<()> {
    let (genuine, impostor) = pair_counts(labels);
    if genuine == 0 {
        return Err(ForgePqError::EmptyPopulation(Population::Genuine));
    }
    if impostor == 0 {
        return Err(ForgePqError::EmptyPopulation(Population::Impostor));
    }
    Ok(())
}

/// Keeps every `stride`-th value pushed to it.
struct StridedSample {
    stride: u64,
    seen: u64,
    kept: Vec<f64>,
}

impl StridedSample {
    fn new(population: u64, cap: usize) -> Self {
        let stride = population.div_ceil(cap as u64).max(1);
        Self {
            stride,
            seen: 0,
            kept: Vec::with_capacity(cap),
        }
    }

    #[inline]
    fn push(&mut self, value: f32) {
        if self.seen % self.stride == 0 {
            self.kept.push(value as f64);
        }
        self.seen += 1;
    }
}

/// Walk all sample pairs and return the downsampled genuine and impostor
/// score populations, each at most `cap` long.
///
/// Pairs are visited in `(i, j), i < j` order and a population keeps every
/// `ceil(len / cap)`-th score, so memory stays bounded by `cap` however many
/// samples trained the table.
pub fn score_populations(
    table: &LookupTable,
    assignments: &[u8],
    labels: &[i32],
    cap: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if assignments.len() != labels.len() {
        return Err(ForgePqError::invalid_parameter(format!(
            "{} assignments for {} labels",
            assignments.len(),
            labels.len()
        )));
    }
    ensure_populations(labels)?;

    let (genuine_pairs, impostor_pairs) = pair_counts(labels);
    let mut genuine = StridedSample::new(genuine_pairs, cap);
    let mut impostor = StridedSample::new(impostor_pairs, cap);

    for i in 0..assignments.len() {
        let (ai, li) = (assignments[i], labels[i]);
        for j in (i + 1)..assignments.len() {
            let score = table.get(ai, assignments[j]);
            if li == labels[j] {
                genuine.push(score);
            } else {
                impostor.push(score);
            }
        }
    }

    Ok((genuine.kept, impostor.kept))
}

/// Gaussian kernel density estimate over a fixed set of scores.
#[derive(Clone, Debug)]
pub struct KernelDensity {
    samples: Vec<f64>,
    bandwidth: f64,
    log_norm: f64,
}

impl KernelDensity {
    /// Fit with Silverman's rule-of-thumb bandwidth, floored at
    /// `MIN_BANDWIDTH`.
    pub fn fit(samples: Vec<f64>) -> Result<Self> {
        if samples.is_empty() {
            return Err(ForgePqError::invalid_parameter(
                "kernel density needs at least one sample",
            ));
        }

        let raw = silverman_bandwidth(&samples);
        let bandwidth = if raw.is_finite() && raw >= MIN_BANDWIDTH {
            raw
        } else {
            tracing::warn!(
                raw_bandwidth = raw,
                floor = MIN_BANDWIDTH,
                samples = samples.len(),
                "degenerate score population, clamping kernel bandwidth"
            );
            MIN_BANDWIDTH
        };

        let n = samples.len() as f64;
        let log_norm = (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt()).ln();
        Ok(Self {
            samples,
            bandwidth,
            log_norm,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// `ln f(x)`, evaluated with log-sum-exp so it stays finite far from
    /// every sample.
    pub fn log_density(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let exponent = |s: f64| {
            let z = (x - s) / h;
            -0.5 * z * z
        };

        let max = self
            .samples
            .iter()
            .map(|&s| exponent(s))
            .fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = self.samples.iter().map(|&s| (exponent(s) - max).exp()).sum();

        max + sum.ln() - self.log_norm
    }

    /// `f(x)`. May underflow to zero; prefer [`log_density`](Self::log_density).
    pub fn density(&self, x: f64) -> f64 {
        self.log_density(x).exp()
    }
}

/// Silverman's rule of thumb: `(4σ⁵ / 3n)^(1/5)`.
pub fn silverman_bandwidth(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|&s| (s - mean).powi(2)).sum::<f64>() / n;
    let sigma = variance.sqrt();
    (4.0 * sigma.powi(5) / (3.0 * n)).powf(0.2)
}

/// Rewrite `table` in place as genuine/impostor log-likelihood ratios.
///
/// `assignments[i]` is the center index of training sample `i` within this
/// subspace and `labels[i]` its class.
///
/// # Errors
/// [`ForgePqError::EmptyPopulation`] if every pair is genuine or every pair
/// is impostor.
pub fn calibrate(
    table: &mut LookupTable,
    assignments: &[u8],
    labels: &[i32],
) -> Result<CalibrationState> {
    let (genuine, impostor) = score_populations(table, assignments, labels, SAMPLE_CAP)?;

    let genuine = KernelDensity::fit(genuine)?;
    let impostor = KernelDensity::fit(impostor)?;

    table.map_in_place(|d| {
        let x = d as f64;
        let llr = genuine.log_density(x) - impostor.log_density(x);
        llr.clamp(f32::MIN as f64, f32::MAX as f64) as f32
    });

    Ok(CalibrationState {
        genuine_bandwidth: genuine.bandwidth(),
        impostor_bandwidth: impostor.bandwidth(),
    })
}
