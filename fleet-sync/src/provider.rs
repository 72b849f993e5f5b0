//! Seams to the three external systems a cycle reads and writes.
//!
//! Every call is synchronous and may block; async callers run cycles on a
//! blocking thread. Implementations must be shareable across threads.

use fleet_core::DomainName;

use crate::actions::RemoteAction;
use crate::error::ProviderError;
use crate::sheet::SheetRow;
use crate::translate::{NativeInventoryDevice, NativeStoreDevice};

/// Provider names used in error reports.
pub const INVENTORY: &str = "inventory provider";
pub const STORE: &str = "canonical store";
pub const SHEET: &str = "spreadsheet";

/// Authoritative device inventory, one tenant at a time.
pub trait InventoryProvider: Send + Sync {
    fn fetch_devices(&self, domain: &DomainName) -> Result<Vec<NativeInventoryDevice>, ProviderError>;

    /// Issue a lifecycle action against the device with `resource_id`.
    fn issue_action(
        &self,
        domain: &DomainName,
        resource_id: &str,
        action: &RemoteAction,
    ) -> Result<(), ProviderError>;
}

/// Persistent keyed store holding the merged canonical records.
pub trait CanonicalStore: Send + Sync {
    /// All records, or only those whose domain equals `domain`.
    fn fetch(&self, domain: Option<&DomainName>) -> Result<Vec<NativeStoreDevice>, ProviderError>;

    fn get(&self, storage_key: &str) -> Result<Option<NativeStoreDevice>, ProviderError>;

    /// Insert or replace the record stored under `storage_key`.
    fn upsert(&self, storage_key: &str, device: &NativeStoreDevice) -> Result<(), ProviderError>;
}

/// The human-facing device spreadsheet.
pub trait Spreadsheet: Send + Sync {
    /// Data rows below the header, in sheet order.
    fn fetch_rows(&self) -> Result<Vec<SheetRow>, ProviderError>;

    /// Replace every data row and stamp the last-updated cell.
    fn write_rows(&self, rows: &[SheetRow], last_updated: &str) -> Result<(), ProviderError>;
}

/// Borrowed bundle of the providers one cycle talks to.
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub inventory: &'a dyn InventoryProvider,
    pub store: &'a dyn CanonicalStore,
    pub sheet: &'a dyn Spreadsheet,
}
