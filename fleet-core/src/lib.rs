//! Fleet core library: device types, identifier normalization, configuration,
//! and read-only queries over canonical device records.
//!
//! - [`types`]: newtypes and the canonical [`DeviceRecord`]
//! - [`normalize`]: identifier and phone-number canonicalization
//! - [`config`]: load / save / init of `~/.fleet/config.yaml`
//! - [`query`]: search and directory lookups
//! - [`error`]: [`ConfigError`], [`RecordError`], [`QueryError`]

pub mod config;
pub mod error;
pub mod normalize;
pub mod query;
pub mod types;

pub use config::{DomainConfig, FleetConfig, WipeKind};
pub use error::{ConfigError, QueryError, RecordError};
pub use types::{
    Augmentation, DeviceRecord, DirectoryEntry, DomainName, IdentityKey, LifecycleState,
};
