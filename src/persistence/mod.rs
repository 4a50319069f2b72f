//! Persistence codec for trained quantizers.
//!
//! The codec is a pure mapping between a [`QuantizerSnapshot`] value and a
//! checksummed byte blob; it knows nothing about how the snapshot was
//! trained.
//!
//! # Blob Format
//!
//! ```text
//! [MAGIC 8B "FORGEPQ\0"][VERSION u32][FLAGS u32][SUBSPACES u32][CHECKSUM u32]
//! [BODY bincode(QuantizerSnapshot)]
//! ```
//!
//! The body lists subspaces in index order, each as its 256 centers followed
//! by its 256 x 256 lookup table. Tables are stored even though raw tables
//! could be rebuilt from centers: calibrated tables cannot.
//!
//! # Example
//!
//! ```ignore
//! let bytes = quantizer.serialize()?;
//! let restored = ProductQuantizer::deserialize(&bytes, registry)?;
//!
//! quantizer.save("faces.fpq")?;
//! let loaded = ProductQuantizer::load("faces.fpq", registry)?;
//! ```

mod format;

pub use format::{BlobHeader, FormatFlags, FORMAT_VERSION, MAGIC};

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationState;
use crate::config::QuantizerConfig;
use crate::constants::pq::{CENTROIDS, TABLE_CELLS};
use crate::error::{ForgePqError, Result};
use crate::types::QuantizerId;

/// One subspace of a trained quantizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubspaceSnapshot {
    /// 256 x width centers, row-major.
    pub centers: Vec<f32>,
    /// 256 x 256 lookup table, row-major.
    pub table: Vec<f32>,
    /// Kernel bandwidths, present iff the quantizer is calibrated.
    pub calibration: Option<CalibrationState>,
}

/// Everything needed to restore a trained quantizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizerSnapshot {
    pub id: QuantizerId,
    pub config: QuantizerConfig,
    /// Feature dimensionality.
    pub dim: usize,
    /// Subspaces in index order.
    pub subspaces: Vec<SubspaceSnapshot>,
}

impl QuantizerSnapshot {
    /// Check internal consistency: config, dimensionality, and every
    /// center/table length.
    pub fn validate(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| ForgePqError::invalid_format(format!("stored config: {}", e)))?;

        let width = self.config.subspace_width;
        let overflow = || ForgePqError::invalid_format(format!("subspace width {} is too large", width));
        let expected_dim = self.subspaces.len().checked_mul(width).ok_or_else(overflow)?;
        let center_values = CENTROIDS.checked_mul(width).ok_or_else(overflow)?;

        if self.subspaces.is_empty() || self.dim != expected_dim {
            return Err(ForgePqError::invalid_format(format!(
                "dimension {} does not match {} subspaces of width {}",
                self.dim,
                self.subspaces.len(),
                width
            )));
        }

        for (i, sub) in self.subspaces.iter().enumerate() {
            if sub.centers.len() != center_values {
                return Err(ForgePqError::invalid_format(format!(
                    "subspace {}: expected {} center values, got {}",
                    i,
                    center_values,
                    sub.centers.len()
                )));
            }
            if sub.table.len() != TABLE_CELLS {
                return Err(ForgePqError::invalid_format(format!(
                    "subspace {}: expected {} table cells, got {}",
                    i,
                    TABLE_CELLS,
                    sub.table.len()
                )));
            }
            if sub.calibration.is_some() != self.config.calibrate {
                return Err(ForgePqError::invalid_format(format!(
                    "subspace {}: calibration state does not match config",
                    i
                )));
            }
        }

        Ok(())
    }
}

/// Encode a snapshot as a blob.
pub fn encode_blob(snapshot: &QuantizerSnapshot) -> Result<Vec<u8>> {
    snapshot.validate()?;

    let body = bincode::serialize(snapshot)?;
    let subspaces = u32::try_from(snapshot.subspaces.len())
        .map_err(|_| ForgePqError::invalid_parameter("too many subspaces for blob header"))?;

    let mut flags = FormatFlags::default();
    if snapshot.config.calibrate {
        flags.set(FormatFlags::CALIBRATED);
    }

    let header = BlobHeader::new(flags, subspaces, crc32fast::hash(&body));
    let mut blob = Vec::with_capacity(BlobHeader::SIZE + body.len());
    blob.extend_from_slice(&header.to_bytes());
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode and validate a blob.
///
/// # Errors
/// `InvalidFormat` for a bad header or inconsistent body,
/// `ChecksumMismatch` for a corrupted body, `SerializationError` if the
/// body cannot be decoded.
pub fn decode_blob(blob: &[u8]) -> Result<QuantizerSnapshot> {
    let body = verify_header(blob)?;
    let header = BlobHeader::from_bytes(blob)?;

    let snapshot: QuantizerSnapshot = bincode::deserialize(body)?;

    if snapshot.subspaces.len() != header.subspaces as usize {
        return Err(ForgePqError::invalid_format(format!(
            "header declares {} subspaces, body has {}",
            header.subspaces,
            snapshot.subspaces.len()
        )));
    }
    if header.flags.has(FormatFlags::CALIBRATED) != snapshot.config.calibrate {
        return Err(ForgePqError::invalid_format(
            "calibration flag does not match stored config",
        ));
    }
    snapshot.validate()?;

    Ok(snapshot)
}

/// Verify the header and checksum; return the body.
pub(crate) fn verify_header(blob: &[u8]) -> Result<&[u8]> {
    if blob.len() < BlobHeader::SIZE {
        return Err(ForgePqError::invalid_format("blob too small for header"));
    }

    let header = BlobHeader::from_bytes(&blob[..BlobHeader::SIZE])?;
    header.verify()?;

    let body = &blob[BlobHeader::SIZE..];
    if crc32fast::hash(body) != header.checksum {
        return Err(ForgePqError::ChecksumMismatch);
    }

    Ok(body)
}

/// Write a blob to `path`, flushing it to disk.
pub(crate) fn write_blob(path: impl AsRef<Path>, blob: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(blob)?;
    file.sync_all()?;
    Ok(())
}

pub(crate) fn read_blob(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}
