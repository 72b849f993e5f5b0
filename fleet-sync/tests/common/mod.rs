//! In-memory providers with call counting and failure injection.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use fleet_core::{
    config::{DomainConfig, FleetConfig},
    DomainName,
};
use fleet_sync::{
    error::ProviderError,
    provider::{CanonicalStore, InventoryProvider, Providers, Spreadsheet},
    sheet::{SheetColumn, SheetRow},
    translate::{NativeInventoryDevice, NativeStoreDevice},
    RemoteAction,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn config(domains: &[&str]) -> FleetConfig {
    FleetConfig {
        domains: domains
            .iter()
            .map(|d| DomainConfig {
                name: DomainName::from(*d),
                customer_id: "C0123".into(),
                admin_user: format!("admin@{d}"),
            })
            .collect(),
        ..FleetConfig::default()
    }
}

pub fn inventory_device(sn: &str, name: &str, email: &str, status: &str) -> NativeInventoryDevice {
    NativeInventoryDevice {
        resource_id: format!("res-{}", sn.replace(' ', "")),
        serial_number: sn.into(),
        email: vec![email.into()],
        name: vec![name.into()],
        model: "Pixel 8".into(),
        os: "Android 14".into(),
        status: status.into(),
        first_sync: "2023-01-01T00:00:00Z".into(),
        last_sync: "2024-03-01T11:00:00Z".into(),
        ..Default::default()
    }
}

pub fn store_device(sn: &str, domain: &str, notes: &str) -> NativeStoreDevice {
    NativeStoreDevice {
        domain: domain.into(),
        serial_number: sn.into(),
        notes: notes.into(),
        ..Default::default()
    }
}

pub fn sheet_row(domain: &str, sn: &str, phone: &str, notes: &str) -> SheetRow {
    let mut cells = vec![String::new(); SheetColumn::ALL.len()];
    cells[SheetColumn::Domain.index()] = domain.into();
    cells[SheetColumn::SerialNumber.index()] = sn.into();
    cells[SheetColumn::PhoneNumber.index()] = phone.into();
    cells[SheetColumn::Notes.index()] = notes.into();
    SheetRow(cells)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemInventory {
    pub devices: Mutex<HashMap<DomainName, Vec<NativeInventoryDevice>>>,
    pub fail: Mutex<bool>,
    pub fail_actions: Mutex<bool>,
    pub issued: Mutex<Vec<(DomainName, String, RemoteAction)>>,
}

impl MemInventory {
    pub fn with(domain: &str, devices: Vec<NativeInventoryDevice>) -> Self {
        let inv = Self::default();
        inv.devices
            .lock()
            .unwrap()
            .insert(DomainName::from(domain), devices);
        inv
    }

    pub fn issued(&self) -> Vec<(DomainName, String, RemoteAction)> {
        self.issued.lock().unwrap().clone()
    }
}

impl InventoryProvider for MemInventory {
    fn fetch_devices(&self, domain: &DomainName) -> Result<Vec<NativeInventoryDevice>, ProviderError> {
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Unavailable("directory offline".into()));
        }
        Ok(self
            .devices
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    fn issue_action(
        &self,
        domain: &DomainName,
        resource_id: &str,
        action: &RemoteAction,
    ) -> Result<(), ProviderError> {
        if *self.fail_actions.lock().unwrap() {
            return Err(ProviderError::Rejected("quota exceeded".into()));
        }
        self.issued
            .lock()
            .unwrap()
            .push((domain.clone(), resource_id.to_string(), *action));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemStore {
    pub devices: Mutex<BTreeMap<String, NativeStoreDevice>>,
    /// Entries `get` returns instead of the fetched snapshot, to simulate a
    /// concurrent writer between read and write.
    pub overrides: Mutex<HashMap<String, NativeStoreDevice>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_upsert_after: Mutex<Option<usize>>,
    pub fetches: Mutex<usize>,
    pub upserts: Mutex<usize>,
}

impl MemStore {
    pub fn with(devices: Vec<(&str, NativeStoreDevice)>) -> Self {
        let store = Self::default();
        {
            let mut map = store.devices.lock().unwrap();
            for (key, device) in devices {
                map.insert(key.to_string(), device);
            }
        }
        store
    }

    pub fn snapshot(&self) -> BTreeMap<String, NativeStoreDevice> {
        self.devices.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> usize {
        *self.upserts.lock().unwrap()
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

impl CanonicalStore for MemStore {
    fn fetch(&self, domain: Option<&DomainName>) -> Result<Vec<NativeStoreDevice>, ProviderError> {
        *self.fetches.lock().unwrap() += 1;
        if *self.fail_fetch.lock().unwrap() {
            return Err(ProviderError::Unavailable("store offline".into()));
        }
        Ok(self
            .devices
            .lock()
            .unwrap()
            .values()
            .filter(|d| domain.map_or(true, |want| d.domain == want.as_str()))
            .cloned()
            .collect())
    }

    fn get(&self, storage_key: &str) -> Result<Option<NativeStoreDevice>, ProviderError> {
        if let Some(device) = self.overrides.lock().unwrap().get(storage_key) {
            return Ok(Some(device.clone()));
        }
        Ok(self.devices.lock().unwrap().get(storage_key).cloned())
    }

    fn upsert(&self, storage_key: &str, device: &NativeStoreDevice) -> Result<(), ProviderError> {
        let mut upserts = self.upserts.lock().unwrap();
        if let Some(limit) = *self.fail_upsert_after.lock().unwrap() {
            if *upserts >= limit {
                return Err(ProviderError::Unavailable("store write timeout".into()));
            }
        }
        *upserts += 1;
        self.overrides.lock().unwrap().remove(storage_key);
        self.devices
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), device.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemSheet {
    pub rows: Mutex<Vec<SheetRow>>,
    pub last_updated: Mutex<Option<String>>,
    pub fail_fetch: Mutex<bool>,
    /// Drop the last row on write, so the read-back does not match.
    pub lossy: Mutex<bool>,
    pub writes: Mutex<usize>,
}

impl MemSheet {
    pub fn with(rows: Vec<SheetRow>) -> Self {
        let sheet = Self::default();
        *sheet.rows.lock().unwrap() = rows;
        sheet
    }

    pub fn rows(&self) -> Vec<SheetRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl Spreadsheet for MemSheet {
    fn fetch_rows(&self) -> Result<Vec<SheetRow>, ProviderError> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(ProviderError::Unavailable("sheet offline".into()));
        }
        Ok(self.rows())
    }

    fn write_rows(&self, rows: &[SheetRow], last_updated: &str) -> Result<(), ProviderError> {
        *self.writes.lock().unwrap() += 1;
        let mut stored = rows.to_vec();
        if *self.lossy.lock().unwrap() {
            stored.pop();
        }
        *self.rows.lock().unwrap() = stored;
        *self.last_updated.lock().unwrap() = Some(last_updated.to_string());
        Ok(())
    }
}

pub fn providers<'a>(inv: &'a MemInventory, store: &'a MemStore, sheet: &'a MemSheet) -> Providers<'a> {
    Providers {
        inventory: inv,
        store,
        sheet,
    }
}
