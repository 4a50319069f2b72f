//! Product Quantization with lookup-table scoring.
//!
//! Product Quantization (PQ) compresses vectors by splitting them into
//! subspaces and quantizing each subspace independently.
//!
//! Key concepts:
//! - Split D-dimensional vectors into D/n subspaces of n dimensions
//! - Train 256 centers (codebook) for each subspace using k-means
//! - Encode each vector as D/n bytes (one center index per subspace)
//! - Precompute a 256 x 256 center-to-center table per subspace, so two codes
//!   are compared with one lookup per subspace and no float vectors at all
//! - Optionally calibrate those tables into genuine/impostor log-likelihood
//!   ratios learned from the class labels of the training set
//!
//! The codebooks stay with the [`ProductQuantizer`]; the tables are published
//! to a [`QuantizerRegistry`] under the quantizer's [`QuantizerId`], so codes
//! can be scored anywhere the registry is shared.

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::calibration::{self, CalibrationState};
use crate::config::QuantizerConfig;
use crate::constants::pq::CENTROIDS;
use crate::error::{ForgePqError, Result};
use crate::evaluator::DistanceEvaluator;
use crate::kmeans::KMeans;
use crate::lut::LookupTable;
use crate::persistence::{self, QuantizerSnapshot, SubspaceSnapshot};
use crate::registry::{HolderId, QuantizerRegistry, RegistryEntry};
use crate::types::{Dimension, QuantizedCode, QuantizerId};
use crate::vector::{Matrix, Sample};

/// Trained state of one subspace.
struct SubspaceModel {
    centers: Matrix,
    table: LookupTable,
    calibration: Option<CalibrationState>,
}

struct Trained {
    dim: usize,
    /// One 256 x n codebook per subspace.
    codebooks: Vec<Matrix>,
    /// The entry this quantizer published.
    entry: Arc<RegistryEntry>,
}

/// Product quantizer: subspace codebooks plus published lookup tables.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use forge_pq::{ProductQuantizer, QuantizerConfig, QuantizerRegistry, Sample};
///
/// # fn main() -> forge_pq::Result<()> {
/// # let samples: Vec<Sample> = Vec::new();
/// let registry = Arc::new(QuantizerRegistry::new());
/// let mut pq = ProductQuantizer::new(QuantizerConfig::default(), Arc::clone(&registry));
/// pq.train(&samples)?;
///
/// let a = pq.encode(&samples[0].data)?;
/// let b = pq.encode(&samples[1].data)?;
/// let score = registry.compare(pq.id(), &a, &b)?;
/// # Ok(())
/// # }
/// ```
pub struct ProductQuantizer {
    id: QuantizerId,
    config: QuantizerConfig,
    registry: Arc<QuantizerRegistry>,
    /// This instance's claim on `id` in the registry.
    holder: HolderId,
    trained: Option<Trained>,
}

impl ProductQuantizer {
    /// Create an untrained quantizer with a fresh identity.
    pub fn new(config: QuantizerConfig, registry: Arc<QuantizerRegistry>) -> Self {
        let holder = registry.next_holder();
        Self {
            id: QuantizerId::generate(),
            config,
            registry,
            holder,
            trained: None,
        }
    }

    /// Train codebooks and lookup tables, then publish the tables.
    ///
    /// All inputs are validated before any clustering starts. Subspaces
    /// are trained independently (concurrently unless `config.parallel` is
    /// off); nothing is published unless every subspace succeeds.
    ///
    /// # Errors
    /// - `InvalidParameter` for a bad config, or for sample values too large
    ///   for center distances to stay finite in `f32`.
    /// - `EmptySampleSet`, `DimensionMismatch`, `NonFiniteValue` for bad input.
    /// - `DimensionNotDivisible` if `D mod n != 0`.
    /// - `EmptyPopulation` if calibrating and only one class (or only
    ///   singleton classes) is present.
    /// - `InsufficientSamples` if a subspace has fewer than 256 distinct
    ///   points.
    pub fn train(&mut self, samples: &[Sample]) -> Result<()> {
        self.config.validate()?;
        let dim = validate_samples(samples, self.config.subspace_width)?;

        let labels: Vec<i32> = samples.iter().map(|s| s.label).collect();
        if self.config.calibrate {
            calibration::ensure_populations(&labels)?;
        }

        let n_subspaces = dim / self.config.subspace_width;
        tracing::info!(
            quantizer = %self.id,
            samples = samples.len(),
            dim,
            subspaces = n_subspaces,
            metric = self.config.metric.name(),
            calibrate = self.config.calibrate,
            "training product quantizer"
        );

        let config = &self.config;
        let task = |i: usize| train_subspace(config, samples, &labels, i);

        // Collecting into Result joins every task and keeps the first error.
        let models: Vec<SubspaceModel> = if !config.parallel {
            (0..n_subspaces).map(task).collect::<Result<_>>()?
        } else if let Some(threads) = config.num_threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(|| (0..n_subspaces).into_par_iter().map(task).collect::<Result<_>>())?
        } else {
            (0..n_subspaces).into_par_iter().map(task).collect::<Result<_>>()?
        };

        let mut codebooks = Vec::with_capacity(n_subspaces);
        let mut tables = Vec::with_capacity(n_subspaces);
        let mut states = Vec::with_capacity(n_subspaces);
        for model in models {
            codebooks.push(model.centers);
            tables.push(model.table);
            states.extend(model.calibration);
        }

        let calibration = self.config.calibrate.then_some(states);
        let entry = self
            .registry
            .publish_held(self.id, tables, calibration, self.holder)?;
        self.trained = Some(Trained {
            dim,
            codebooks,
            entry,
        });
        Ok(())
    }

    /// Encode a vector into one center index per subspace.
    ///
    /// Exact nearest center under the configured metric; ties go to the
    /// lowest index.
    ///
    /// # Errors
    /// `NotTrained` before training, `DimensionMismatch` for a wrong length.
    pub fn encode(&self, vector: &[f32]) -> Result<QuantizedCode> {
        let trained = self.trained.as_ref().ok_or(ForgePqError::NotTrained)?;
        if vector.len() != trained.dim {
            return Err(ForgePqError::dimension_mismatch(trained.dim, vector.len()));
        }

        let width = self.config.subspace_width;
        let metric = self.config.metric;
        let code = trained
            .codebooks
            .iter()
            .zip(vector.chunks_exact(width))
            .map(|(codebook, sub)| metric.nearest(sub, codebook.iter_rows()).0 as u8)
            .collect();

        Ok(QuantizedCode::new(code))
    }

    /// Encode many vectors in parallel, preserving order.
    pub fn encode_batch<V>(&self, vectors: &[V]) -> Result<Vec<QuantizedCode>>
    where
        V: AsRef<[f32]> + Sync,
    {
        vectors.par_iter().map(|v| self.encode(v.as_ref())).collect()
    }

    /// Score two codes produced by this quantizer against its current
    /// registry entry. Larger means more similar.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        if self.trained.is_none() {
            return Err(ForgePqError::NotTrained);
        }
        self.registry.compare(self.id, a, b)
    }

    /// An evaluator pinned to the tables this quantizer published.
    pub fn evaluator(&self) -> Result<DistanceEvaluator> {
        let trained = self.trained.as_ref().ok_or(ForgePqError::NotTrained)?;
        Ok(DistanceEvaluator::new(Arc::clone(&trained.entry)))
    }

    pub fn id(&self) -> QuantizerId {
        self.id
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<QuantizerRegistry> {
        &self.registry
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    /// Feature dimensionality, once trained.
    pub fn dim(&self) -> Option<Dimension> {
        self.trained.as_ref().map(|t| Dimension::new(t.dim))
    }

    /// Code length in bytes, once trained.
    pub fn num_subspaces(&self) -> Option<usize> {
        self.trained.as_ref().map(|t| t.codebooks.len())
    }

    /// Per-subspace 256 x n codebooks. Empty before training.
    pub fn codebooks(&self) -> &[Matrix] {
        self.trained
            .as_ref()
            .map(|t| t.codebooks.as_slice())
            .unwrap_or(&[])
    }

    /// The registry entry this quantizer published.
    pub fn entry(&self) -> Option<&Arc<RegistryEntry>> {
        self.trained.as_ref().map(|t| &t.entry)
    }

    /// Capture the trained state as a codec value.
    pub fn snapshot(&self) -> Result<QuantizerSnapshot> {
        let trained = self.trained.as_ref().ok_or(ForgePqError::NotTrained)?;
        let calibration = trained.entry.calibration();

        let subspaces = trained
            .codebooks
            .iter()
            .zip(trained.entry.tables())
            .enumerate()
            .map(|(i, (centers, table))| SubspaceSnapshot {
                centers: centers.as_slice().to_vec(),
                table: table.values().to_vec(),
                calibration: calibration.map(|states| states[i]),
            })
            .collect();

        Ok(QuantizerSnapshot {
            id: self.id,
            config: self.config.clone(),
            dim: trained.dim,
            subspaces,
        })
    }

    /// Restore a quantizer from a snapshot and republish its tables under
    /// the stored identity.
    ///
    /// Restoring into a registry that still serves a live quantizer with the
    /// same id installs a new version; the entry stays published until both
    /// have been dropped.
    pub fn from_snapshot(snapshot: QuantizerSnapshot, registry: Arc<QuantizerRegistry>) -> Result<Self> {
        snapshot.validate()?;

        let width = snapshot.config.subspace_width;
        let mut codebooks = Vec::with_capacity(snapshot.subspaces.len());
        let mut tables = Vec::with_capacity(snapshot.subspaces.len());
        let mut states = Vec::with_capacity(snapshot.subspaces.len());
        for sub in snapshot.subspaces {
            let centers = Matrix::from_vec(CENTROIDS, width, sub.centers)
                .ok_or_else(|| ForgePqError::invalid_format("codebook size mismatch"))?;
            codebooks.push(centers);
            tables.push(LookupTable::from_values(sub.table)?);
            states.extend(sub.calibration);
        }

        let calibration = snapshot.config.calibrate.then_some(states);
        let holder = registry.next_holder();
        let entry = registry.publish_held(snapshot.id, tables, calibration, holder)?;
        tracing::info!(quantizer = %snapshot.id, version = entry.version(), "restored product quantizer");

        Ok(Self {
            id: snapshot.id,
            config: snapshot.config,
            registry,
            holder,
            trained: Some(Trained {
                dim: snapshot.dim,
                codebooks,
                entry,
            }),
        })
    }

    /// Serialize codebooks, tables and calibration state into a blob.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        persistence::encode_blob(&self.snapshot()?)
    }

    /// Restore from a blob produced by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8], registry: Arc<QuantizerRegistry>) -> Result<Self> {
        Self::from_snapshot(persistence::decode_blob(bytes)?, registry)
    }

    /// Serialize to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::write_blob(path, &self.serialize()?)
    }

    /// Load from a file written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>, registry: Arc<QuantizerRegistry>) -> Result<Self> {
        Self::deserialize(&persistence::read_blob(path)?, registry)
    }
}

impl Drop for ProductQuantizer {
    fn drop(&mut self) {
        // Other live quantizers with this id keep the entry published.
        self.registry.release(self.id, self.holder);
    }
}

/// Largest magnitude whose center-to-center distances over `width`
/// dimensions stay finite in `f32` under every supported metric.
fn magnitude_limit(width: usize) -> f32 {
    ((f32::MAX as f64 / width.max(1) as f64).sqrt() / 4.0) as f32
}

/// Validate the sample set and return its dimensionality.
fn validate_samples(samples: &[Sample], width: usize) -> Result<usize> {
    let first = samples.first().ok_or(ForgePqError::EmptySampleSet)?;
    let dim = first.dim();
    if dim == 0 {
        return Err(ForgePqError::invalid_parameter("samples have zero dimensions"));
    }
    if !Dimension::new(dim).is_divisible_by(width) {
        return Err(ForgePqError::dimension_not_divisible(dim, width));
    }

    let limit = magnitude_limit(width);
    for (i, s) in samples.iter().enumerate() {
        if s.dim() != dim {
            return Err(ForgePqError::dimension_mismatch(dim, s.dim()));
        }
        if let Some(d) = s.data.iter().position(|v| !v.is_finite()) {
            return Err(ForgePqError::NonFiniteValue { sample: i, dim: d });
        }
        if let Some(d) = s.data.iter().position(|v| v.abs() > limit) {
            return Err(ForgePqError::invalid_parameter(format!(
                "sample {} dimension {}: magnitude {:e} exceeds {:e}",
                i, d, s.data[d], limit
            )));
        }
    }

    Ok(dim)
}

/// Cluster one subspace and build (and optionally calibrate) its table.
fn train_subspace(
    config: &QuantizerConfig,
    samples: &[Sample],
    labels: &[i32],
    index: usize,
) -> Result<SubspaceModel> {
    let _span = tracing::debug_span!("subspace", index).entered();

    let width = config.subspace_width;
    let data = Matrix::from_column_range(samples, index * width, (index + 1) * width);

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
    let clustering = KMeans::new(CENTROIDS, config.kmeans_iterations, config.kmeans_attempts)
        .with_parallel(config.parallel)
        .fit(&data, &mut rng)?;

    let mut table = LookupTable::build(&clustering.centroids, config.metric)?;

    let calibration = if config.calibrate {
        let assignments: Vec<u8> = clustering.assignments.iter().map(|&a| a as u8).collect();
        Some(calibration::calibrate(&mut table, &assignments, labels)?)
    } else {
        None
    };

    tracing::debug!(inertia = clustering.inertia, "trained subspace");
    Ok(SubspaceModel {
        centers: clustering.centroids,
        table,
        calibration,
    })
}
