//! Named constants for configuration values.
//!
//! This module centralizes magic numbers and default values used throughout
//! the codebase, making them easier to find, document, and tune.

/// Constants for Product Quantization (PQ).
pub mod pq {
    /// Number of centers per subspace codebook.
    /// One byte addresses a center, so this never changes.
    pub const CENTROIDS: usize = 256;

    /// Number of cells in a per-subspace lookup table (256 x 256).
    pub const TABLE_CELLS: usize = CENTROIDS * CENTROIDS;

    /// Default subspace width (dimensions per code byte).
    pub const DEFAULT_SUBSPACE_WIDTH: usize = 2;

    /// Default seed for codebook training.
    pub const DEFAULT_SEED: u64 = 42;
}

/// Constants for k-means clustering.
pub mod kmeans {
    /// Upper bound on Lloyd iterations per restart.
    pub const MAX_ITERATIONS: usize = 10;

    /// Minimum number of random restarts.
    pub const MIN_ATTEMPTS: usize = 3;
}

/// Constants for likelihood-ratio calibration.
pub mod calibration {
    /// Each score population is downsampled to at most this many scores
    /// before density estimation.
    pub const SAMPLE_CAP: usize = 256;

    /// Floor for kernel bandwidths. Degenerate populations (all scores
    /// equal) would otherwise produce a zero-width kernel.
    pub const MIN_BANDWIDTH: f64 = 1e-4;
}
