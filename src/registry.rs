//! Shared storage for trained lookup tables.
//!
//! A [`ProductQuantizer`](crate::ProductQuantizer) owns its codebooks, but the
//! tables needed to score its codes live here, keyed by the quantizer's
//! identity. Any component holding the registry and a [`QuantizerId`] can
//! score codes without the quantizer itself.
//!
//! Entries are immutable. Publishing under an existing id installs a new
//! entry with a higher version; readers that already hold the previous
//! `Arc<RegistryEntry>` keep seeing it unchanged.
//!
//! Several live quantizers can share one id (a quantizer and a copy restored
//! from its blob). Each registers as a holder of the id, and the entry is
//! unpublished when the last holder releases it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::calibration::CalibrationState;
use crate::error::{ForgePqError, Result};
use crate::evaluator::{self, DistanceEvaluator};
use crate::lut::LookupTable;
use crate::types::QuantizerId;

/// The published lookup tables of one trained quantizer.
#[derive(Debug)]
pub struct RegistryEntry {
    id: QuantizerId,
    version: u64,
    tables: Vec<LookupTable>,
    calibration: Option<Vec<CalibrationState>>,
}

impl RegistryEntry {
    pub fn id(&self) -> QuantizerId {
        self.id
    }

    /// Registry-wide publication counter value for this entry.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// One table per subspace, in subspace order.
    pub fn tables(&self) -> &[LookupTable] {
        &self.tables
    }

    pub fn num_subspaces(&self) -> usize {
        self.tables.len()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Per-subspace kernel bandwidths, if the tables were calibrated.
    pub fn calibration(&self) -> Option<&[CalibrationState]> {
        self.calibration.as_deref()
    }

    /// Score two codes. Larger means more similar.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        evaluator::score(&self.tables, self.is_calibrated(), a, b)
    }
}

/// Token identifying one live holder of a published id.
pub(crate) type HolderId = u64;

#[derive(Debug)]
struct Slot {
    entry: Arc<RegistryEntry>,
    holders: HashSet<HolderId>,
}

/// Maps quantizer identities to their current [`RegistryEntry`].
///
/// Shared as `Arc<QuantizerRegistry>` between the quantizers that publish
/// and the evaluators that read.
#[derive(Debug, Default)]
pub struct QuantizerRegistry {
    entries: RwLock<HashMap<QuantizerId, Slot>>,
    next_version: AtomicU64,
    next_holder: AtomicU64,
}

impl QuantizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `tables` as the current entry for `id`.
    ///
    /// The entry becomes visible to other threads in one step, fully
    /// populated. Holders already registered for `id` are kept.
    ///
    /// # Errors
    /// `InvalidParameter` if `tables` is empty or `calibration` does not have
    /// one state per table.
    pub fn publish(
        &self,
        id: QuantizerId,
        tables: Vec<LookupTable>,
        calibration: Option<Vec<CalibrationState>>,
    ) -> Result<Arc<RegistryEntry>> {
        self.install(id, tables, calibration, None)
    }

    /// Publish on behalf of `holder`, registering it as a holder of `id`.
    pub(crate) fn publish_held(
        &self,
        id: QuantizerId,
        tables: Vec<LookupTable>,
        calibration: Option<Vec<CalibrationState>>,
        holder: HolderId,
    ) -> Result<Arc<RegistryEntry>> {
        self.install(id, tables, calibration, Some(holder))
    }

    /// A fresh holder token.
    pub(crate) fn next_holder(&self) -> HolderId {
        self.next_holder.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop `holder`'s claim on `id`, unpublishing the entry if no holder
    /// remains. Returns whether the entry was removed.
    pub(crate) fn release(&self, id: QuantizerId, holder: HolderId) -> bool {
        let mut entries = self.entries.write();
        let Some(slot) = entries.get_mut(&id) else {
            return false;
        };
        if !slot.holders.remove(&holder) || !slot.holders.is_empty() {
            return false;
        }
        entries.remove(&id);
        tracing::debug!(quantizer = %id, "unpublished lookup tables");
        true
    }

    fn install(
        &self,
        id: QuantizerId,
        tables: Vec<LookupTable>,
        calibration: Option<Vec<CalibrationState>>,
        holder: Option<HolderId>,
    ) -> Result<Arc<RegistryEntry>> {
        if tables.is_empty() {
            return Err(ForgePqError::invalid_parameter(
                "cannot publish an entry without lookup tables",
            ));
        }
        if let Some(states) = &calibration {
            if states.len() != tables.len() {
                return Err(ForgePqError::invalid_parameter(format!(
                    "{} calibration states for {} tables",
                    states.len(),
                    tables.len()
                )));
            }
        }

        let entry = Arc::new(RegistryEntry {
            id,
            version: self.next_version.fetch_add(1, Ordering::Relaxed) + 1,
            tables,
            calibration,
        });

        {
            let mut entries = self.entries.write();
            let slot = entries.entry(id).or_insert_with(|| Slot {
                entry: Arc::clone(&entry),
                holders: HashSet::new(),
            });
            slot.entry = Arc::clone(&entry);
            slot.holders.extend(holder);
        }
        tracing::info!(
            quantizer = %id,
            version = entry.version,
            subspaces = entry.num_subspaces(),
            calibrated = entry.is_calibrated(),
            "published lookup tables"
        );
        Ok(entry)
    }

    /// Current entry for `id`.
    pub fn get(&self, id: QuantizerId) -> Option<Arc<RegistryEntry>> {
        self.entries.read().get(&id).map(|slot| Arc::clone(&slot.entry))
    }

    /// An evaluator pinned to the current entry for `id`.
    ///
    /// # Errors
    /// `NotTrained` if nothing is published under `id`.
    pub fn evaluator(&self, id: QuantizerId) -> Result<DistanceEvaluator> {
        self.get(id)
            .map(DistanceEvaluator::new)
            .ok_or(ForgePqError::NotTrained)
    }

    /// Score two codes produced by quantizer `id`.
    ///
    /// # Errors
    /// `NotTrained` if nothing is published under `id`, plus the errors of
    /// [`RegistryEntry::compare`].
    pub fn compare(&self, id: QuantizerId, a: &[u8], b: &[u8]) -> Result<f32> {
        let entry = self.get(id).ok_or(ForgePqError::NotTrained)?;
        entry.compare(a, b)
    }

    pub fn contains(&self, id: QuantizerId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Remove and return the entry for `id`, regardless of holders.
    pub fn remove(&self, id: QuantizerId) -> Option<Arc<RegistryEntry>> {
        self.entries.write().remove(&id).map(|slot| slot.entry)
    }

    /// Remove the entry for `id` only if it is still `version`.
    ///
    /// Returns whether an entry was removed.
    pub fn remove_version(&self, id: QuantizerId, version: u64) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&id) {
            Some(slot) if slot.entry.version == version => {
                entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Number of live quantizers holding `id`.
    pub fn holder_count(&self, id: QuantizerId) -> usize {
        self.entries
            .read()
            .get(&id)
            .map_or(0, |slot| slot.holders.len())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Identities with a published entry, in no particular order.
    pub fn ids(&self) -> Vec<QuantizerId> {
        self.entries.read().keys().copied().collect()
    }
}
