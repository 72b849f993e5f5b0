//! Fleet configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.fleet/
//!   config.yaml      (mode 0600, created by `fleet init`)
//!   data/            (default root of the local adapters)
//! ```
//!
//! # API pattern
//!
//! Every filesystem-touching function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::DomainName;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which remote wipe the `wipe` action issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WipeKind {
    /// Full device wipe.
    #[default]
    AdminRemoteWipe,
    /// Remove only the managed account from the device.
    AdminAccountWipe,
}

impl fmt::Display for WipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WipeKind::AdminRemoteWipe => write!(f, "admin_remote_wipe"),
            WipeKind::AdminAccountWipe => write!(f, "admin_account_wipe"),
        }
    }
}

/// One tenant known to Fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: DomainName,
    /// Immutable customer id of the tenant in the directory service.
    #[serde(default)]
    pub customer_id: String,
    /// Administrative user the directory calls run as.
    #[serde(default)]
    pub admin_user: String,
}

/// Immutable configuration, loaded once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub remote_wipe_type: WipeKind,
    /// Root directory of the local file-backed adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    /// Daemon schedule; `0` disables scheduled cycles.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// 1-based spreadsheet row holding the column header.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
}

fn default_cycle_timeout_secs() -> u64 {
    300
}

fn default_sync_interval_secs() -> u64 {
    900
}

/// Lowest usable header row; row 1 holds the last-updated stamp.
pub const MIN_HEADER_ROW: usize = 2;

fn default_header_row() -> usize {
    MIN_HEADER_ROW
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            domains: vec![],
            remote_wipe_type: WipeKind::default(),
            data_dir: None,
            cycle_timeout_secs: default_cycle_timeout_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            header_row: default_header_row(),
        }
    }
}

impl FleetConfig {
    pub fn is_domain_configured(&self, domain: &str) -> bool {
        self.domain(domain).is_some()
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|d| d.name.0 == domain)
    }

    /// Names of every configured domain, in configuration order.
    pub fn domain_names(&self) -> Vec<DomainName> {
        self.domains.iter().map(|d| d.name.clone()).collect()
    }

    /// Expand an optional domain filter into the list of domains to process.
    pub fn resolve_scope(&self, domain: Option<&str>) -> Result<Vec<DomainName>, ConfigError> {
        match domain {
            None => Ok(self.domain_names()),
            Some(name) => self
                .domain(name)
                .map(|d| vec![d.name.clone()])
                .ok_or_else(|| ConfigError::UnknownDomain {
                    domain: name.to_string(),
                }),
        }
    }

    /// Local adapter root: `data_dir` if set, else `<home>/.fleet/data`.
    pub fn data_dir_at(&self, home: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| fleet_dir(home).join("data"))
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.header_row < MIN_HEADER_ROW {
            return Err(ConfigError::Invalid(
                "header_row must be at least 2; row 1 holds the last-updated stamp".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for d in &self.domains {
            if d.name.0.trim().is_empty() {
                return Err(ConfigError::Invalid("domain name cannot be empty".into()));
            }
            if !seen.insert(d.name.0.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "domain '{}' configured twice",
                    d.name
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.fleet/`
pub fn fleet_dir(home: &Path) -> PathBuf {
    home.join(".fleet")
}

/// `<home>/.fleet/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    fleet_dir(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save / init
// ---------------------------------------------------------------------------

/// Load `<home>/.fleet/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<FleetConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: FleetConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<FleetConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &FleetConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let dir = fleet_dir(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &FleetConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

/// Write a config listing `domains` if none exists yet.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path, domains: Vec<DomainConfig>) -> Result<FleetConfig, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    let config = FleetConfig {
        domains,
        ..FleetConfig::default()
    };
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(domains: Vec<DomainConfig>) -> Result<FleetConfig, ConfigError> {
    init_at(&home()?, domains)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
