//! Reconciliation Engine.
//!
//! One merged record per authoritative device. Authoritative fields are
//! copied verbatim; augmentation comes from the canonical store and is then
//! overridden field by field by any non-empty spreadsheet value.
//!
//! Records found only in the store or the sheet are left alone: absence from
//! the inventory is not a deletion signal.

use std::collections::{HashMap, HashSet};

use fleet_core::{DeviceRecord, IdentityKey};

/// Output of one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Merged records, in authoritative order.
    pub merged: Vec<DeviceRecord>,
    /// Authoritative records dropped because an earlier one had the same key.
    pub duplicates: usize,
    /// Merged records that found a canonical store entry.
    pub store_matches: usize,
    /// Merged records that found a spreadsheet row.
    pub sheet_matches: usize,
}

/// Merge the three translated snapshots of one cycle.
pub fn reconcile(
    authoritative: &[DeviceRecord],
    store: &[DeviceRecord],
    sheet: &[DeviceRecord],
) -> Reconciliation {
    let store_index = index_by_identity(store);
    let sheet_index = index_by_identity(sheet);

    let mut seen = HashSet::with_capacity(authoritative.len());
    let mut out = Reconciliation::default();

    for a in authoritative {
        let Some(key) = a.identity_key() else {
            // Translators reject these; nothing to match on.
            continue;
        };
        if !seen.insert(key.clone()) {
            tracing::warn!("duplicate authoritative device {key}; keeping the first");
            out.duplicates += 1;
            continue;
        }

        let mut merged = a.clone();
        merged.augmentation = Default::default();

        if let Some(s) = lookup(&store_index, a) {
            merged.augmentation.overlay(&s.augmentation);
            out.store_matches += 1;
        }
        if let Some(h) = lookup(&sheet_index, a) {
            merged.augmentation.overlay(&h.augmentation);
            out.sheet_matches += 1;
        }
        out.merged.push(merged);
    }

    tracing::debug!(
        "reconciled {} device(s): {} store match(es), {} sheet match(es), {} duplicate(s)",
        out.merged.len(),
        out.store_matches,
        out.sheet_matches,
        out.duplicates
    );
    out
}

/// Index records by identity key; the first record seen for a key wins.
///
/// Scans the whole slice; a miss is only concluded after every record has
/// been looked at.
pub fn index_by_identity(records: &[DeviceRecord]) -> HashMap<IdentityKey, &DeviceRecord> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(key) = record.identity_key() {
            index.entry(key).or_insert(record);
        }
    }
    index
}

/// Find the entry for `record`: by its identity key first, then by its IMEI
/// among entries that were only ever recorded by IMEI.
pub fn lookup<'a>(
    index: &HashMap<IdentityKey, &'a DeviceRecord>,
    record: &DeviceRecord,
) -> Option<&'a DeviceRecord> {
    let key = record.identity_key()?;
    if let Some(found) = index.get(&key) {
        return Some(*found);
    }
    match key {
        IdentityKey::Serial(_) => record.imei_key().and_then(|imei| index.get(&imei).copied()),
        IdentityKey::Imei(_) => None,
    }
}
