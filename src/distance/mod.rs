//! Base distance metrics used for codebook training, encoding and
//! lookup-table construction.
//!
//! Every metric here is a true dissimilarity: it returns a value `>= 0` and
//! `0` for identical inputs. The uncalibrated scoring path maps a sum of
//! table entries through `-ln(sum + 1)`, which is only defined for
//! non-negative sums, so similarity-style metrics (e.g. a raw dot product)
//! are not offered.

pub mod scalar;

pub use scalar::{cosine_distance, euclidean_distance, euclidean_distance_squared, manhattan_distance};

use serde::{Deserialize, Serialize};

/// Supported base distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2))
    #[default]
    Euclidean,
    /// Squared Euclidean distance: sum((a[i] - b[i])^2)
    EuclideanSquared,
    /// Manhattan (L1) distance: sum(|a[i] - b[i]|)
    Manhattan,
    /// Cosine distance: 1 - cosine_similarity(a, b), range [0, 2].
    Cosine,
}

impl DistanceMetric {
    /// Compute the distance between two equal-length slices.
    ///
    /// # Panics
    /// Panics if the slices have different lengths.
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::EuclideanSquared => euclidean_distance_squared(a, b),
            DistanceMetric::Manhattan => manhattan_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Index of the row of `centers` nearest to `query`.
    ///
    /// Exact linear scan; ties resolve to the lowest index.
    #[inline]
    pub fn nearest<'a, I>(&self, query: &[f32], centers: I) -> (usize, f32)
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut best = (0, f32::INFINITY);
        for (idx, center) in centers.into_iter().enumerate() {
            let d = self.compute(query, center);
            if d < best.1 {
                best = (idx, d);
            }
        }
        best
    }

    /// Short lowercase name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "l2",
            DistanceMetric::EuclideanSquared => "l2sq",
            DistanceMetric::Manhattan => "l1",
            DistanceMetric::Cosine => "cosine",
        }
    }
}
