//! Scoring of quantized codes against published lookup tables.

use std::sync::Arc;

use crate::error::{ForgePqError, Result};
use crate::lut::LookupTable;
use crate::registry::RegistryEntry;
use crate::types::QuantizerId;

/// Sum `tables[i][a[i]][b[i]]` and map it onto a "larger is more similar"
/// score.
///
/// Calibrated tables already hold log-likelihood ratios, so their sum is the
/// score, saturated to the finite `f32` range. Raw distance sums go through
/// `-ln(sum + 1)`, which is 0 for identical codes and decreases as codes move
/// apart. Sums are accumulated in `f64`.
///
/// # Errors
/// - `CodeLengthMismatch` if either code is not one byte per table.
/// - `NonPositiveDistanceSum` if a raw sum is `<= -1` or NaN.
pub fn score(tables: &[LookupTable], calibrated: bool, a: &[u8], b: &[u8]) -> Result<f32> {
    if a.len() != tables.len() {
        return Err(ForgePqError::code_length_mismatch(tables.len(), a.len()));
    }
    if b.len() != tables.len() {
        return Err(ForgePqError::code_length_mismatch(tables.len(), b.len()));
    }

    let sum: f64 = tables
        .iter()
        .zip(a.iter().zip(b))
        .map(|(table, (&ca, &cb))| table.get(ca, cb) as f64)
        .sum();

    if calibrated {
        return Ok(sum.clamp(f32::MIN as f64, f32::MAX as f64) as f32);
    }

    let shifted = sum + 1.0;
    if shifted.is_nan() || shifted <= 0.0 {
        return Err(ForgePqError::NonPositiveDistanceSum(sum as f32));
    }
    Ok(-shifted.ln() as f32)
}

/// Compares codes against one specific published version of a quantizer's
/// tables.
///
/// Holding the entry keeps that version alive: republishing the same
/// quantizer later does not change what this evaluator returns.
#[derive(Clone, Debug)]
pub struct DistanceEvaluator {
    entry: Arc<RegistryEntry>,
}

impl DistanceEvaluator {
    pub fn new(entry: Arc<RegistryEntry>) -> Self {
        Self { entry }
    }

    /// Score two codes. Larger means more similar.
    #[inline]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        score(self.entry.tables(), self.entry.is_calibrated(), a, b)
    }

    pub fn id(&self) -> QuantizerId {
        self.entry.id()
    }

    pub fn version(&self) -> u64 {
        self.entry.version()
    }

    pub fn entry(&self) -> &Arc<RegistryEntry> {
        &self.entry
    }
}
