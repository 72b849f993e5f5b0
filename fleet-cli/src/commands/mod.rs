pub mod action;
pub mod daemon;
pub mod diff;
pub mod directory;
pub mod domains;
pub mod init;
pub mod search;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use fleet_core::{config, FleetConfig};

/// Home directory and loaded config, the starting point of every command
/// except `init`.
pub(crate) fn load_context() -> Result<(PathBuf, FleetConfig)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::load_at(&home).context("failed to load fleet config")?;
    Ok((home, config))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
