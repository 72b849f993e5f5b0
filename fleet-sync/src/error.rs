//! Error types for fleet-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use fleet_core::error::ConfigError;

/// Point of the cycle at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchInventory,
    FetchStore,
    FetchSheet,
    WriteStore,
    WriteSheet,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::FetchInventory => "fetch inventory",
            Stage::FetchStore => "fetch canonical store",
            Stage::FetchSheet => "fetch spreadsheet",
            Stage::WriteStore => "write canonical store",
            Stage::WriteSheet => "write spreadsheet",
        };
        f.write_str(s)
    }
}

/// Failure reported by an external data source.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Unavailable(String),

    /// A write went through but reading it back did not return what was sent.
    #[error("write not confirmed: {0}")]
    Unconfirmed(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// All errors that abort a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An external source failed; `processed` records how far the stage got.
    #[error("{provider} unavailable during {stage} after {processed} record(s): {source}")]
    ProviderUnavailable {
        provider: &'static str,
        stage: Stage,
        processed: usize,
        #[source]
        source: ProviderError,
    },

    #[error("cycle deadline exceeded during {stage} after {processed} record(s)")]
    DeadlineExceeded { stage: Stage, processed: usize },
}

impl SyncError {
    /// Stable error code reported over the daemon socket.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Config(ConfigError::UnknownDomain { .. }) => "UNKNOWN_DOMAIN",
            SyncError::Config(_) => "INVALID_REQUEST",
            SyncError::ProviderUnavailable { .. } | SyncError::DeadlineExceeded { .. } => {
                "PROVIDER_UNAVAILABLE"
            }
        }
    }
}

/// Convenience constructor for [`ProviderError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ProviderError {
    ProviderError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`ProviderError::Json`].
pub(crate) fn json_err(path: impl Into<PathBuf>, source: serde_json::Error) -> ProviderError {
    ProviderError::Json {
        path: path.into(),
        source,
    }
}
