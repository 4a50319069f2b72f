//! Per-subspace 256 x 256 lookup tables.
//!
//! `table[j][k]` holds the base-metric distance between centers `j` and `k`
//! of one subspace codebook, or after calibration the log-likelihood ratio
//! of that distance. Comparing two codes then costs one lookup per subspace.

use serde::{Deserialize, Serialize};

use crate::constants::pq::{CENTROIDS, TABLE_CELLS};
use crate::distance::DistanceMetric;
use crate::error::{ForgePqError, Result};
use crate::vector::Matrix;

/// A 256 x 256 row-major table of `f32` scores for one subspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    values: Vec<f32>,
}

impl LookupTable {
    /// Build the raw distance table for a codebook.
    ///
    /// O(256²) metric evaluations, independent of how many samples trained
    /// the codebook.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `centers` does not have 256 rows or a
    /// distance overflows `f32`.
    pub fn build(centers: &Matrix, metric: DistanceMetric) -> Result<Self> {
        if centers.rows() != CENTROIDS {
            return Err(ForgePqError::invalid_parameter(format!(
                "codebook must have {} centers, got {}",
                CENTROIDS,
                centers.rows()
            )));
        }

        let mut values = Vec::with_capacity(TABLE_CELLS);
        for j in 0..CENTROIDS {
            let cj = centers.row(j);
            for k in 0..CENTROIDS {
                values.push(metric.compute(cj, centers.row(k)));
            }
        }

        if let Some(cell) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForgePqError::invalid_parameter(format!(
                "distance between centers {} and {} is not finite",
                cell / CENTROIDS,
                cell % CENTROIDS
            )));
        }

        Ok(Self { values })
    }

    /// Wrap 65536 row-major values.
    ///
    /// # Errors
    /// Returns `InvalidFormat` for any other length.
    pub fn from_values(values: Vec<f32>) -> Result<Self> {
        if values.len() != TABLE_CELLS {
            return Err(ForgePqError::invalid_format(format!(
                "lookup table must have {} cells, got {}",
                TABLE_CELLS,
                values.len()
            )));
        }
        Ok(Self { values })
    }

    /// Score between center `a` and center `b`.
    #[inline(always)]
    pub fn get(&self, a: u8, b: u8) -> f32 {
        self.values[(a as usize) * CENTROIDS + b as usize]
    }

    /// Replace every cell with `f(cell)`.
    pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.values {
            *v = f(*v);
        }
    }

    /// Row-major cell values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}
