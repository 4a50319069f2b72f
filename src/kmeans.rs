//! K-Means clustering for codebook training.
//!
//! Implements Lloyd's algorithm with k-means++ seeding and several seeded
//! restarts, keeping the restart with the lowest inertia. Used to learn the
//! 256 centers of each product-quantization subspace.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use crate::error::{ForgePqError, Result};
use crate::vector::Matrix;

/// Outcome of a k-means run.
#[derive(Clone, Debug)]
pub struct Clustering {
    /// `k x dim` matrix of cluster centers.
    pub centroids: Matrix,
    /// Cluster index of every input row.
    pub assignments: Vec<usize>,
    /// Sum of squared distances from each row to its center.
    pub inertia: f64,
}

/// K-Means clustering algorithm.
pub struct KMeans {
    /// Number of clusters.
    k: usize,
    /// Maximum Lloyd iterations per restart.
    max_iters: usize,
    /// Number of seeded restarts.
    attempts: usize,
    /// Use rayon for the assignment step.
    parallel: bool,
}

impl KMeans {
    /// Create a new K-Means instance.
    ///
    /// # Arguments
    /// * `k` - Number of clusters
    /// * `max_iters` - Maximum iterations per restart
    /// * `attempts` - Number of restarts; the lowest-inertia run wins
    pub fn new(k: usize, max_iters: usize, attempts: usize) -> Self {
        Self {
            k,
            max_iters,
            attempts: attempts.max(1),
            parallel: false,
        }
    }

    /// Run the assignment step on the current rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Cluster the rows of `data`.
    ///
    /// # Errors
    /// - [`ForgePqError::EmptySampleSet`] if `data` has no rows.
    /// - [`ForgePqError::InsufficientSamples`] if `data` has fewer than `k`
    ///   distinct rows. Checked before any clustering work.
    pub fn fit(&self, data: &Matrix, rng: &mut StdRng) -> Result<Clustering> {
        if data.rows() == 0 {
            return Err(ForgePqError::EmptySampleSet);
        }
        if self.k == 0 {
            return Err(ForgePqError::invalid_parameter("k must be at least 1"));
        }

        let distinct = count_distinct_rows(data);
        if distinct < self.k {
            return Err(ForgePqError::insufficient_samples(self.k, distinct));
        }

        let mut best: Option<Clustering> = None;
        for _ in 0..self.attempts {
            let run = self.fit_once(data, rng);
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        best.ok_or(ForgePqError::EmptySampleSet)
    }

    fn fit_once(&self, data: &Matrix, rng: &mut StdRng) -> Clustering {
        let mut centroids = self.kmeans_plus_plus_init(data, rng);
        let (mut assignments, mut distances) = self.assign(data, &centroids);

        for _ in 0..self.max_iters {
            update_centroids(data, &assignments, &mut centroids);
            let (next, next_distances) = self.assign(data, &centroids);
            let changed = next != assignments;
            assignments = next;
            distances = next_distances;
            if !changed {
                break;
            }
        }

        let inertia = distances.iter().sum();
        Clustering {
            centroids,
            assignments,
            inertia,
        }
    }

    /// Initialize centroids using k-means++.
    ///
    /// Each new center is drawn with probability proportional to the squared
    /// distance to the nearest center picked so far. Already-picked rows
    /// have weight zero, so with at least `k` distinct rows every center is
    /// distinct.
    fn kmeans_plus_plus_init(&self, data: &Matrix, rng: &mut StdRng) -> Matrix {
        let n = data.rows();
        let mut centroids = Matrix::zeros(self.k, data.cols());

        let first = rng.gen_range(0..n);
        centroids.row_mut(0).copy_from_slice(data.row(first));

        let mut min_dist: Vec<f64> = data
            .iter_rows()
            .map(|r| squared_distance(r, centroids.row(0)))
            .collect();

        for c in 1..self.k {
            let total: f64 = min_dist.iter().sum();

            let chosen = if total.is_finite() && total > 0.0 {
                let mut r = rng.gen_range(0.0..total);
                let mut pick = None;
                for (i, &d) in min_dist.iter().enumerate() {
                    r -= d;
                    if r <= 0.0 && d > 0.0 {
                        pick = Some(i);
                        break;
                    }
                }
                // Rounding can leave `r` slightly positive after the last row.
                pick.unwrap_or_else(|| farthest(&min_dist))
            } else {
                farthest(&min_dist)
            };

            centroids.row_mut(c).copy_from_slice(data.row(chosen));
            for (i, row) in data.iter_rows().enumerate() {
                let d = squared_distance(row, centroids.row(c));
                if d < min_dist[i] {
                    min_dist[i] = d;
                }
            }
        }

        centroids
    }

    /// Assign each row to its nearest centroid.
    ///
    /// Returns the centroid index and squared distance for every row.
    fn assign(&self, data: &Matrix, centroids: &Matrix) -> (Vec<usize>, Vec<f64>) {
        let nearest = |row: &[f32]| -> (usize, f64) {
            let mut best = (0, f64::INFINITY);
            for (idx, c) in centroids.iter_rows().enumerate() {
                let d = squared_distance(row, c);
                if d < best.1 {
                    best = (idx, d);
                }
            }
            best
        };

        let pairs: Vec<(usize, f64)> = if self.parallel {
            (0..data.rows())
                .into_par_iter()
                .map(|i| nearest(data.row(i)))
                .collect()
        } else {
            data.iter_rows().map(nearest).collect()
        };

        pairs.into_iter().unzip()
    }
}

/// Move each centroid to the mean of its assigned rows.
///
/// Empty clusters retain their old centroid.
fn update_centroids(data: &Matrix, assignments: &[usize], centroids: &mut Matrix) {
    let k = centroids.rows();
    let dim = centroids.cols();
    let mut sums = vec![0.0f64; k * dim];
    let mut counts = vec![0usize; k];

    for (row, &cluster) in data.iter_rows().zip(assignments) {
        counts[cluster] += 1;
        let acc = &mut sums[cluster * dim..(cluster + 1) * dim];
        for (a, &v) in acc.iter_mut().zip(row) {
            *a += v as f64;
        }
    }

    for (cluster, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let acc = &sums[cluster * dim..(cluster + 1) * dim];
        for (c, &s) in centroids.row_mut(cluster).iter_mut().zip(acc) {
            *c = (s / count as f64) as f32;
        }
    }
}

/// Squared L2 distance accumulated in `f64`. Finite for any finite input,
/// where the `f32` kernel overflows once coordinates differ by about 1.8e19.
#[inline]
fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}

fn farthest(min_dist: &[f64]) -> usize {
    min_dist
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Number of distinct rows, comparing values bitwise with `-0.0 == 0.0`.
pub fn count_distinct_rows(data: &Matrix) -> usize {
    let mut seen: HashSet<Vec<u32>> = HashSet::with_capacity(data.rows());
    for row in data.iter_rows() {
        seen.insert(row.iter().map(|&v| (v + 0.0).to_bits()).collect());
    }
    seen.len()
}
