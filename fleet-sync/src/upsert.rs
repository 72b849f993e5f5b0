//! Upsert Planner.
//!
//! ## Canonical store, per record
//!
//! 1. Re-read the stored entry under the record's storage key.
//! 2. Fill every empty augmentation field of the merged record from it.
//! 3. Compare the planned entry with the stored one → `Unchanged` if equal.
//! 4. Otherwise upsert (or report `WouldWrite` in dry-run mode).
//!
//! ## Spreadsheet, whole body
//!
//! The body is rendered from the planned records, digested with SHA-256 and
//! written in one call together with the last-updated stamp. The write is
//! confirmed by reading the body back and comparing digests.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use fleet_core::{DeviceRecord, IdentityKey};

use crate::error::{ProviderError, Stage, SyncError};
use crate::pipeline::Deadline;
use crate::provider::{CanonicalStore, Spreadsheet, SHEET, STORE};
use crate::sheet::{format_last_updated, SheetColumn, SheetRow};
use crate::translate::{to_store, translate_store};

/// Key reported for the spreadsheet body write.
pub const SHEET_BODY: &str = "sheet";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual store or sheet write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WriteResult {
    /// Content changed or did not previously exist.
    Written { key: String },
    /// Planned content equals what is already stored.
    Unchanged { key: String },
    /// `--dry-run` mode: the write *would* have happened.
    WouldWrite { key: String },
}

impl WriteResult {
    pub fn key(&self) -> &str {
        match self {
            WriteResult::Written { key }
            | WriteResult::Unchanged { key }
            | WriteResult::WouldWrite { key } => key,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, WriteResult::Unchanged { .. })
    }
}

// ---------------------------------------------------------------------------
// Canonical store
// ---------------------------------------------------------------------------

/// Result of the store phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub writes: Vec<WriteResult>,
    /// Records as planned for the store, in merge order. The sheet is
    /// rendered from these.
    pub records: Vec<DeviceRecord>,
}

/// Union a merged record with the entry currently stored for it.
///
/// Merged augmentation wins; the stored value only fills fields the merge
/// left empty.
pub fn plan_store_record(merged: &DeviceRecord, existing: Option<&DeviceRecord>) -> DeviceRecord {
    let mut planned = merged.clone();
    if let Some(existing) = existing {
        planned.augmentation.fill_gaps(&existing.augmentation);
    }
    planned
}

/// Upsert every merged record into the canonical store.
pub fn write_store(
    store: &dyn CanonicalStore,
    merged: &[DeviceRecord],
    dry_run: bool,
    deadline: &Deadline,
) -> Result<StoreOutcome, SyncError> {
    let mut outcome = StoreOutcome::default();
    for record in merged {
        let processed = outcome.writes.len();
        deadline.check(Stage::WriteStore, processed)?;
        let Some(identity) = record.identity_key() else {
            continue;
        };
        let key = identity.storage_key();

        let existing_native = store
            .get(&key)
            .map_err(|e| store_unavailable(processed, e))?;
        let existing = existing_native
            .as_ref()
            .and_then(|native| translate_store(native).ok());
        let planned = plan_store_record(record, existing.as_ref());
        let native = to_store(&planned);

        let result = if existing_native.as_ref() == Some(&native) {
            tracing::debug!("store unchanged: {key}");
            WriteResult::Unchanged { key }
        } else if dry_run {
            tracing::info!("[dry-run] would upsert: {key}");
            WriteResult::WouldWrite { key }
        } else {
            store
                .upsert(&key, &native)
                .map_err(|e| store_unavailable(processed, e))?;
            tracing::debug!("store upserted: {key}");
            WriteResult::Written { key }
        };
        outcome.writes.push(result);
        outcome.records.push(planned);
    }
    Ok(outcome)
}

fn store_unavailable(processed: usize, source: ProviderError) -> SyncError {
    SyncError::ProviderUnavailable {
        provider: STORE,
        stage: Stage::WriteStore,
        processed,
        source,
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// The body a cycle will write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetPlan {
    pub rows: Vec<SheetRow>,
    /// Rows rendered from this cycle's records.
    pub merged_rows: usize,
    /// Existing rows outside this cycle's records, kept verbatim.
    pub carried_rows: usize,
}

impl SheetPlan {
    pub fn digest(&self) -> String {
        body_digest(&self.rows)
    }
}

/// Render the sheet body: one row per record plus every other non-blank
/// existing row, all ordered by domain, owner name, identity.
///
/// An existing row is replaced when a record covers its identity, either by
/// the record's own key or, for rows that carry only an IMEI, by the record's
/// IMEI.
pub fn plan_sheet(records: &[DeviceRecord], existing: &[SheetRow], now: DateTime<Utc>) -> SheetPlan {
    let mut covered: HashSet<IdentityKey> = HashSet::with_capacity(records.len());
    for record in records {
        covered.extend(record.identity_key());
        covered.extend(record.imei_key());
    }

    let mut rows: Vec<SheetRow> = records
        .iter()
        .map(|record| SheetRow::from_record(record, now))
        .collect();
    let merged_rows = rows.len();

    rows.extend(
        existing
            .iter()
            .filter(|row| !row.is_blank())
            .filter(|row| row.identity_key().map_or(true, |k| !covered.contains(&k)))
            .cloned(),
    );
    let carried_rows = rows.len() - merged_rows;

    // Stable: identity-less rows keep their relative order.
    rows.sort_by_cached_key(row_order);

    SheetPlan {
        rows,
        merged_rows,
        carried_rows,
    }
}

fn row_order(row: &SheetRow) -> (String, String, Option<IdentityKey>) {
    (
        row.cell(SheetColumn::Domain).to_string(),
        row.cell(SheetColumn::OwnerName).to_lowercase(),
        row.identity_key(),
    )
}

/// SHA-256 hex digest of a sheet body.
pub fn body_digest(rows: &[SheetRow]) -> String {
    let mut h = Sha256::new();
    for row in rows {
        h.update(row.to_line().as_bytes());
        h.update(b"\n");
    }
    hex::encode(h.finalize())
}

/// Rewrite the sheet body and stamp the last-updated cell.
///
/// The stamp is written on every non-dry-run call, even when the body is
/// unchanged; the returned [`WriteResult`] describes the body only.
///
/// `processed` is the number of records the store phase already handled; a
/// failure here reports it, since those writes stand.
pub fn write_sheet(
    sheet: &dyn Spreadsheet,
    plan: &SheetPlan,
    existing: &[SheetRow],
    now: DateTime<Utc>,
    dry_run: bool,
    processed: usize,
    deadline: &Deadline,
) -> Result<WriteResult, SyncError> {
    deadline.check(Stage::WriteSheet, processed)?;
    let digest = plan.digest();
    let changed = digest != body_digest(existing);
    let key = SHEET_BODY.to_string();

    if dry_run {
        return Ok(if changed {
            tracing::info!("[dry-run] would rewrite sheet body ({} rows)", plan.rows.len());
            WriteResult::WouldWrite { key }
        } else {
            WriteResult::Unchanged { key }
        });
    }

    sheet
        .write_rows(&plan.rows, &format_last_updated(now))
        .map_err(|e| sheet_unavailable(processed, e))?;

    let readback = sheet.fetch_rows().map_err(|e| sheet_unavailable(processed, e))?;
    if body_digest(&readback) != digest {
        return Err(sheet_unavailable(
            processed,
            ProviderError::Unconfirmed(format!(
                "sheet body read back differs from the {} row(s) written",
                plan.rows.len()
            )),
        ));
    }

    Ok(if changed {
        tracing::info!("sheet body rewritten ({} rows)", plan.rows.len());
        WriteResult::Written { key }
    } else {
        tracing::debug!("sheet body unchanged; timestamp refreshed");
        WriteResult::Unchanged { key }
    })
}

fn sheet_unavailable(processed: usize, source: ProviderError) -> SyncError {
    SyncError::ProviderUnavailable {
        provider: SHEET,
        stage: Stage::WriteSheet,
        processed,
        source,
    }
}
