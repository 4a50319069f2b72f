//! Error types for forge-pq operations.
//!
//! Every failure in this crate is fatal for the operation that raised it:
//! training, encoding and scoring are deterministic in-memory computations,
//! so an error always points at a configuration or caller mistake.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using [`ForgePqError`].
pub type Result<T> = std::result::Result<T, ForgePqError>;

/// Which side of a genuine/impostor split a score population belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// Scores between samples that share a class label.
    Genuine,
    /// Scores between samples with different class labels.
    Impostor,
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Population::Genuine => write!(f, "genuine"),
            Population::Impostor => write!(f, "impostor"),
        }
    }
}

/// Errors that can occur during forge-pq operations.
#[derive(Error, Debug)]
pub enum ForgePqError {
    /// Feature dimensionality is not a multiple of the subspace width.
    #[error("dimension {dim} is not divisible by subspace width {width}")]
    DimensionNotDivisible {
        /// Feature vector dimensionality.
        dim: usize,
        /// Configured subspace width.
        width: usize,
    },

    /// Vector dimensions do not match the expected dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected vector dimension.
        expected: usize,
        /// Actual vector dimension provided.
        actual: usize,
    },

    /// A quantized code does not have one byte per subspace.
    #[error("code length mismatch: expected {expected} bytes, got {actual}")]
    CodeLengthMismatch {
        /// Number of subspaces of the quantizer.
        expected: usize,
        /// Length of the code provided.
        actual: usize,
    },

    /// Training requires a non-empty sample set.
    #[error("empty sample set: training requires at least one sample")]
    EmptySampleSet,

    /// Too few distinct samples to form a full codebook.
    #[error("insufficient samples: required {required} distinct points, got {actual}")]
    InsufficientSamples {
        /// Number of distinct points needed (one per center).
        required: usize,
        /// Number of distinct points available.
        actual: usize,
    },

    /// Calibration found no pairs for one of the score populations.
    #[error("calibration impossible: {0} score population is empty")]
    EmptyPopulation(Population),

    /// A sample carries NaN or an infinite value.
    #[error("non-finite value in sample {sample} at dimension {dim}")]
    NonFiniteValue {
        /// Index of the offending sample.
        sample: usize,
        /// Offending dimension within the sample.
        dim: usize,
    },

    /// Encode or compare was called before training or deserialization.
    #[error("quantizer not trained: train or deserialize before encoding or comparing")]
    NotTrained,

    /// The raw distance sum cannot be mapped through `-ln(sum + 1)`.
    #[error("distance sum {0} is outside the domain of -ln(sum + 1)")]
    NonPositiveDistanceSum(f32),

    /// Invalid parameter value provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The bounded training pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during serialization or deserialization.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Checksum verification failed during loading.
    #[error("checksum mismatch: blob may be corrupted")]
    ChecksumMismatch,

    /// Blob has an invalid or unrecognized format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl ForgePqError {
    /// Creates a new `DimensionNotDivisible` error.
    pub fn dimension_not_divisible(dim: usize, width: usize) -> Self {
        Self::DimensionNotDivisible { dim, width }
    }

    /// Creates a new `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates a new `CodeLengthMismatch` error.
    pub fn code_length_mismatch(expected: usize, actual: usize) -> Self {
        Self::CodeLengthMismatch { expected, actual }
    }

    /// Creates a new `InsufficientSamples` error.
    pub fn insufficient_samples(required: usize, actual: usize) -> Self {
        Self::InsufficientSamples { required, actual }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a new `SerializationError`.
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Creates a new `InvalidFormat` error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }
}

impl From<bincode::Error> for ForgePqError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for ForgePqError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForgePqError::dimension_not_divisible(5, 2);
        assert_eq!(
            err.to_string(),
            "dimension 5 is not divisible by subspace width 2"
        );

        let err = ForgePqError::insufficient_samples(256, 100);
        assert_eq!(
            err.to_string(),
            "insufficient samples: required 256 distinct points, got 100"
        );

        let err = ForgePqError::EmptyPopulation(Population::Impostor);
        assert_eq!(
            err.to_string(),
            "calibration impossible: impostor score population is empty"
        );

        let err = ForgePqError::ChecksumMismatch;
        assert_eq!(err.to_string(), "checksum mismatch: blob may be corrupted");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ForgePqError = io_err.into();
        assert!(matches!(err, ForgePqError::Io(_)));
    }
}
