//! `fleet diff`: show the spreadsheet body a sync would write.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;

use fleet_sync::{diff_sheet, pipeline::SyncScope, LocalProviders};

use super::load_context;

/// Arguments for `fleet diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Restrict to one configured domain.
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_context()?;
        let local = LocalProviders::open(&config, &home);
        let scope = SyncScope::from_filter(self.domain.as_deref());

        let result = diff_sheet(&config, local.providers(), scope, Utc::now())
            .map_err(|e| anyhow!("diff failed [{}]: {e}", e.code()))?;

        if result.store_pending > 0 {
            println!(
                "{} canonical store record(s) would change.",
                result.store_pending
            );
        }
        if result.unified_diff.is_empty() {
            println!("No sheet differences for '{}'.", result.scope);
            return Ok(());
        }

        print!("{}", result.unified_diff);
        if !result.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
