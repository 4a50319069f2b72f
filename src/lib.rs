//! forge-pq: Product-quantized templates with lookup-table scoring.
//!
//! This crate compresses fixed-length feature vectors into one byte per
//! subspace and compares two compressed templates with nothing but table
//! lookups.
//!
//! # Features
//!
//! - **Subspace Codebooks**: 256 k-means centers per subspace, trained in parallel with Rayon
//! - **Lookup-Table Scoring**: precomputed 256 x 256 center distances per subspace
//! - **Calibration**: optional genuine/impostor log-likelihood-ratio tables from labeled data
//! - **Shared Registry**: published tables are immutable and versioned, safe to read from any thread
//! - **Persistence**: checksummed binary blobs via bincode
//! - **Scalar Codecs**: byte quantization, sign bits, and nibble packing
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use forge_pq::{LabeledDataset, ProductQuantizer, QuantizerConfig, QuantizerRegistry};
//!
//! let data = LabeledDataset::generate_clustered(2, 150, 4, 0.5, 42);
//! let registry = Arc::new(QuantizerRegistry::new());
//!
//! let mut pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::clone(&registry));
//! pq.train(&data.samples).unwrap();
//!
//! let a = pq.encode(&data.samples[0].data).unwrap();
//! let b = pq.encode(&data.samples[1].data).unwrap();
//! assert_eq!(a.len(), 2);
//!
//! let same = registry.compare(pq.id(), &a, &a).unwrap();
//! let other = registry.compare(pq.id(), &a, &b).unwrap();
//! assert!(same >= other);
//! ```

pub mod calibration;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod evaluator;
pub mod kmeans;
pub mod lut;
pub mod persistence;
pub mod pq;
pub mod registry;
pub mod scalar_quantize;
pub mod types;
pub mod vector;

// Re-export commonly used types at crate root
pub use calibration::{CalibrationState, KernelDensity};
pub use config::QuantizerConfig;
pub use dataset::LabeledDataset;
pub use distance::DistanceMetric;
pub use error::{ForgePqError, Population, Result};
pub use evaluator::DistanceEvaluator;
pub use kmeans::{Clustering, KMeans};
pub use lut::LookupTable;
pub use persistence::{QuantizerSnapshot, SubspaceSnapshot};
pub use pq::ProductQuantizer;
pub use registry::{QuantizerRegistry, RegistryEntry};
pub use scalar_quantize::{binarize, pack_high_nibbles, ScalarQuantizer};
pub use types::{Dimension, QuantizedCode, QuantizerId};
pub use vector::{Matrix, Sample};
