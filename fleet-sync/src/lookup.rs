//! Search and directory queries over the canonical store.

use thiserror::Error;

use fleet_core::{
    config::FleetConfig,
    query::{self, DirectoryLookup, SearchRequest},
    DeviceRecord, DomainName, QueryError,
};

use crate::error::ProviderError;
use crate::provider::{CanonicalStore, STORE};
use crate::translate::{translate_batch, translate_store};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("canonical store unavailable: {0}")]
    Provider(#[from] ProviderError),
}

impl LookupError {
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::Query(e) => e.code(),
            LookupError::Provider(_) => "PROVIDER_UNAVAILABLE",
        }
    }
}

/// Every identifiable record in the store, optionally for one domain.
pub fn canonical_records(
    store: &dyn CanonicalStore,
    domain: Option<&DomainName>,
) -> Result<Vec<DeviceRecord>, ProviderError> {
    let natives = store.fetch(domain)?;
    let (records, _issues) = translate_batch(STORE, &natives, translate_store);
    Ok(records)
}

/// Validate `request` and run it against the store.
pub fn search(
    config: &FleetConfig,
    store: &dyn CanonicalStore,
    request: &SearchRequest,
) -> Result<Vec<DeviceRecord>, LookupError> {
    let q = request.validate(config)?;
    let records = canonical_records(store, q.domain.as_ref())?;
    Ok(query::search(&records, &q).into_iter().cloned().collect())
}

/// Validate `request` as a directory lookup and run it against the store.
pub fn directory(
    config: &FleetConfig,
    store: &dyn CanonicalStore,
    request: &SearchRequest,
) -> Result<DirectoryLookup, LookupError> {
    let q = request.validate_directory(config)?;
    let records = canonical_records(store, q.domain.as_ref())?;
    let lookup = query::directory(&records, &q);
    if lookup.malformed > 0 {
        tracing::warn!(
            "directory {} '{}': skipped {} malformed phone number(s)",
            q.qtype,
            q.q,
            lookup.malformed
        );
    }
    Ok(lookup)
}
