//! File-backed providers rooted at the configured data directory.
//!
//! ```text
//! <data>/
//!   inventory/<domain>.json   authoritative snapshot per domain
//!   inventory/actions.json    append-only log of issued actions
//!   store.json                canonical store, keyed by storage key
//!   sheet.json                spreadsheet cell grid
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use fleet_core::{
    config::{FleetConfig, MIN_HEADER_ROW},
    normalize::email_domain,
    DomainName,
};

use crate::actions::RemoteAction;
use crate::error::{io_err, json_err, ProviderError};
use crate::provider::{CanonicalStore, InventoryProvider, Providers, Spreadsheet};
use crate::sheet::{SheetRow, LAST_UPDATED_LABEL};
use crate::translate::{NativeInventoryDevice, NativeStoreDevice};

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One issued action, as recorded in `actions.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub at: DateTime<Utc>,
    pub domain: DomainName,
    pub resource_id: String,
    pub action: String,
}

/// Snapshots are either a bare device array or a directory listing object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotCompat {
    Listing {
        #[serde(default)]
        mobiledevices: Vec<NativeInventoryDevice>,
    },
    Bare(Vec<NativeInventoryDevice>),
}

pub struct LocalInventory {
    dir: PathBuf,
    log_lock: Mutex<()>,
}

impl LocalInventory {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("inventory"),
            log_lock: Mutex::new(()),
        }
    }

    pub fn snapshot_path(&self, domain: &DomainName) -> PathBuf {
        self.dir.join(format!("{domain}.json"))
    }

    pub fn actions_path(&self) -> PathBuf {
        self.dir.join("actions.json")
    }

    /// Replace the snapshot for `domain`.
    pub fn save_snapshot(
        &self,
        domain: &DomainName,
        devices: &[NativeInventoryDevice],
    ) -> Result<(), ProviderError> {
        write_json_atomic(&self.snapshot_path(domain), &devices)
    }

    /// Every action issued so far, oldest first.
    pub fn action_log(&self) -> Result<Vec<ActionLogEntry>, ProviderError> {
        Ok(read_json(&self.actions_path())?.unwrap_or_default())
    }
}

impl InventoryProvider for LocalInventory {
    fn fetch_devices(&self, domain: &DomainName) -> Result<Vec<NativeInventoryDevice>, ProviderError> {
        let path = self.snapshot_path(domain);
        match read_json::<SnapshotCompat>(&path)? {
            Some(SnapshotCompat::Listing { mobiledevices }) => Ok(mobiledevices),
            Some(SnapshotCompat::Bare(devices)) => Ok(devices),
            None => Err(ProviderError::Unavailable(format!(
                "no inventory snapshot for {domain} at {}",
                path.display()
            ))),
        }
    }

    fn issue_action(
        &self,
        domain: &DomainName,
        resource_id: &str,
        action: &RemoteAction,
    ) -> Result<(), ProviderError> {
        let known = self
            .fetch_devices(domain)?
            .iter()
            .any(|d| d.resource_id == resource_id);
        if !known {
            return Err(ProviderError::Rejected(format!(
                "resource '{resource_id}' is not enrolled in {domain}"
            )));
        }

        let _guard = self
            .log_lock
            .lock()
            .map_err(|_| ProviderError::Unavailable("action log lock poisoned".into()))?;
        let mut log = self.action_log()?;
        log.push(ActionLogEntry {
            at: Utc::now(),
            domain: domain.clone(),
            resource_id: resource_id.to_string(),
            action: action.to_string(),
        });
        write_json_atomic(&self.actions_path(), &log)
    }
}

// ---------------------------------------------------------------------------
// Canonical store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    devices: BTreeMap<String, NativeStoreDevice>,
}

pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("store.json"),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreFile, ProviderError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }
}

fn native_domain(device: &NativeStoreDevice) -> &str {
    let domain = device.domain.trim();
    if domain.is_empty() {
        email_domain(&device.email).unwrap_or_default()
    } else {
        domain
    }
}

impl CanonicalStore for JsonStore {
    fn fetch(&self, domain: Option<&DomainName>) -> Result<Vec<NativeStoreDevice>, ProviderError> {
        let file = self.load()?;
        Ok(file
            .devices
            .into_values()
            .filter(|d| domain.map_or(true, |want| native_domain(d) == want.as_str()))
            .collect())
    }

    fn get(&self, storage_key: &str) -> Result<Option<NativeStoreDevice>, ProviderError> {
        Ok(self.load()?.devices.remove(storage_key))
    }

    fn upsert(&self, storage_key: &str, device: &NativeStoreDevice) -> Result<(), ProviderError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ProviderError::Unavailable("store lock poisoned".into()))?;
        let mut file = self.load()?;
        file.devices.insert(storage_key.to_string(), device.clone());
        write_json_atomic(&self.path, &file)
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SheetFile {
    #[serde(default)]
    rows: Vec<SheetRow>,
}

pub struct JsonSheet {
    path: PathBuf,
    /// 1-based row of the column header; data starts right after it. Never
    /// below [`MIN_HEADER_ROW`].
    header_row: usize,
    lock: Mutex<()>,
}

impl JsonSheet {
    /// A `header_row` below [`MIN_HEADER_ROW`] is raised to it so the header
    /// can never overwrite the stamp row.
    pub fn new(data_dir: &Path, header_row: usize) -> Self {
        if header_row < MIN_HEADER_ROW {
            tracing::warn!("sheet header row {header_row} is reserved; using row {MIN_HEADER_ROW}");
        }
        Self {
            path: data_dir.join("sheet.json"),
            header_row: header_row.max(MIN_HEADER_ROW),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text of the last-updated cell, if the sheet has been written.
    pub fn last_updated(&self) -> Result<Option<String>, ProviderError> {
        let file = self.load()?;
        Ok(file
            .rows
            .first()
            .filter(|row| row.0.first().map(String::as_str) == Some(LAST_UPDATED_LABEL))
            .and_then(|row| row.0.get(1).cloned()))
    }

    fn load(&self) -> Result<SheetFile, ProviderError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }
}

impl Spreadsheet for JsonSheet {
    fn fetch_rows(&self) -> Result<Vec<SheetRow>, ProviderError> {
        Ok(self
            .load()?
            .rows
            .into_iter()
            .skip(self.header_row)
            .collect())
    }

    fn write_rows(&self, rows: &[SheetRow], last_updated: &str) -> Result<(), ProviderError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ProviderError::Unavailable("sheet lock poisoned".into()))?;
        let existing = self.load()?;

        // Rows between the stamp and the header belong to humans; keep them.
        let mut grid: Vec<SheetRow> = existing.rows.into_iter().take(self.header_row).collect();
        grid.resize(self.header_row, SheetRow::default());
        grid[0] = SheetRow(vec![LAST_UPDATED_LABEL.to_string(), last_updated.to_string()]);
        grid[self.header_row - 1] = SheetRow::header();
        grid.extend(rows.iter().cloned());

        write_json_atomic(&self.path, &SheetFile { rows: grid })
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All three local providers for one data directory.
pub struct LocalProviders {
    pub inventory: LocalInventory,
    pub store: JsonStore,
    pub sheet: JsonSheet,
}

impl LocalProviders {
    pub fn new(data_dir: &Path, header_row: usize) -> Self {
        Self {
            inventory: LocalInventory::new(data_dir),
            store: JsonStore::new(data_dir),
            sheet: JsonSheet::new(data_dir, header_row),
        }
    }

    /// Providers for `config`, with `home` resolving the default data dir.
    pub fn open(config: &FleetConfig, home: &Path) -> Self {
        Self::new(&config.data_dir_at(home), config.header_row)
    }

    pub fn providers(&self) -> Providers<'_> {
        Providers {
            inventory: &self.inventory,
            store: &self.store,
            sheet: &self.sheet,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read and parse `path`; `Ok(None)` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ProviderError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| json_err(path, e))
}

/// Write `<path>.tmp`, then rename onto `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ProviderError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| json_err(path, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
