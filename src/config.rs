//! Quantizer configuration.
//!
//! ```
//! use forge_pq::{DistanceMetric, QuantizerConfig};
//!
//! let config = QuantizerConfig::default()
//!     .with_subspace_width(4)
//!     .with_metric(DistanceMetric::Manhattan)
//!     .with_calibration(true)
//!     .with_num_threads(2);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{kmeans, pq};
use crate::distance::DistanceMetric;
use crate::error::{ForgePqError, Result};

/// Training and scoring parameters of a [`ProductQuantizer`](crate::ProductQuantizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Dimensions per subspace (`n`). The feature dimension must be a
    /// multiple of it.
    pub subspace_width: usize,
    /// Base metric for encoding and table construction.
    pub metric: DistanceMetric,
    /// Rewrite tables as genuine/impostor log-likelihood ratios.
    pub calibrate: bool,
    /// Train subspaces concurrently.
    pub parallel: bool,
    /// Size of a dedicated training pool. `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
    /// Seed for k-means; subspace `i` uses `seed + i`.
    pub seed: u64,
    /// Lloyd iterations per k-means restart.
    pub kmeans_iterations: usize,
    /// Number of k-means restarts.
    pub kmeans_attempts: usize,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            subspace_width: pq::DEFAULT_SUBSPACE_WIDTH,
            metric: DistanceMetric::Euclidean,
            calibrate: false,
            parallel: true,
            num_threads: None,
            seed: pq::DEFAULT_SEED,
            kmeans_iterations: kmeans::MAX_ITERATIONS,
            kmeans_attempts: kmeans::MIN_ATTEMPTS,
        }
    }
}

impl QuantizerConfig {
    pub fn with_subspace_width(mut self, width: usize) -> Self {
        self.subspace_width = width;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_calibration(mut self, enabled: bool) -> Self {
        self.calibrate = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Train on a dedicated pool of `threads` workers. Implies `parallel`.
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.parallel = true;
        self.num_threads = Some(threads);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kmeans(mut self, iterations: usize, attempts: usize) -> Self {
        self.kmeans_iterations = iterations;
        self.kmeans_attempts = attempts;
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    /// Returns `InvalidParameter` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.subspace_width == 0 {
            return Err(ForgePqError::invalid_parameter(
                "subspace_width must be at least 1",
            ));
        }
        if !(1..=kmeans::MAX_ITERATIONS).contains(&self.kmeans_iterations) {
            return Err(ForgePqError::invalid_parameter(format!(
                "kmeans_iterations must be in 1..={}, got {}",
                kmeans::MAX_ITERATIONS,
                self.kmeans_iterations
            )));
        }
        if self.kmeans_attempts < kmeans::MIN_ATTEMPTS {
            return Err(ForgePqError::invalid_parameter(format!(
                "kmeans_attempts must be at least {}, got {}",
                kmeans::MIN_ATTEMPTS,
                self.kmeans_attempts
            )));
        }
        if self.num_threads == Some(0) {
            return Err(ForgePqError::invalid_parameter(
                "num_threads must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuantizerConfig::default();
        assert_eq!(config.subspace_width, 2);
        assert_eq!(config.metric, DistanceMetric::Euclidean);
        assert!(!config.calibrate);
        assert!(config.parallel);
        assert_eq!(config.kmeans_iterations, 10);
        assert_eq!(config.kmeans_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            QuantizerConfig::default().with_subspace_width(0),
            QuantizerConfig::default().with_kmeans(11, 3),
            QuantizerConfig::default().with_kmeans(0, 3),
            QuantizerConfig::default().with_kmeans(10, 2),
            QuantizerConfig::default().with_num_threads(0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ForgePqError::InvalidParameter(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_num_threads_implies_parallel() {
        let config = QuantizerConfig::default()
            .with_parallel(false)
            .with_num_threads(4);
        assert!(config.parallel);
        assert_eq!(config.num_threads, Some(4));
    }
}
