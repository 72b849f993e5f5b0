//! # fleet-sync
//!
//! Reconciliation engine and everything that feeds it.
//!
//! Call [`pipeline::run`] to execute one reconciliation cycle for a scope, or
//! [`ActionExecutor`] to apply a directory action to a single device.

pub mod actions;
pub mod diff;
pub mod error;
pub mod local;
pub mod lookup;
pub mod pipeline;
pub mod provider;
pub mod reconcile;
pub mod sheet;
pub mod translate;
pub mod upsert;

pub use actions::{ActionError, ActionExecutor, ActionKind, ActionOutcome, ActionRequest, RemoteAction};
pub use diff::{diff_sheet, SheetDiff};
pub use error::{ProviderError, Stage, SyncError};
pub use local::LocalProviders;
pub use lookup::LookupError;
pub use pipeline::{CycleReport, SyncOptions, SyncScope};
pub use provider::{CanonicalStore, InventoryProvider, Providers, Spreadsheet};
pub use upsert::WriteResult;
