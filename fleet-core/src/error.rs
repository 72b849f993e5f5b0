//! Error types for fleet-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; `~/.fleet/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `fleet init` first")]
    ConfigNotFound { path: PathBuf },

    /// A domain was requested that is not in the configured domain list.
    #[error("domain '{domain}' is not a configured domain")]
    UnknownDomain { domain: String },

    /// The config parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-record problems found while translating source data.
///
/// These never abort a batch; the record is skipped and counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Neither a serial number nor an IMEI survived normalization.
    #[error("record has neither serial number nor IMEI")]
    MissingIdentifier,

    /// A phone number that is not exactly 10 digits after normalization.
    #[error("malformed phone number '{raw}': expected 10 digits")]
    MalformedPhoneNumber { raw: String },
}

/// Validation failures for search and directory requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query type not specified")]
    MissingQueryType,

    #[error("unsupported query type '{0}'")]
    InvalidQueryType(String),

    #[error("query string cannot be empty for query type '{0}'")]
    EmptyQuery(String),

    #[error("domain '{0}' is not a configured domain")]
    UnknownDomain(String),
}

impl QueryError {
    /// Stable taxonomy code returned to automated callers.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownDomain(_) => "UNKNOWN_DOMAIN",
            _ => "INVALID_REQUEST",
        }
    }
}
