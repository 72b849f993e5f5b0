//! `fleet sync`: run one reconciliation cycle against the local adapters.

use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;

use fleet_sync::{
    pipeline::{self, CycleReport, SyncOptions, SyncScope},
    LocalProviders, WriteResult,
};

use super::{load_context, print_json};

/// Arguments for `fleet sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync a single configured domain.
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    /// Sync every configured domain.
    #[arg(long, conflicts_with = "domain")]
    pub all: bool,

    /// Report what would be written without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        if self.domain.is_none() && !self.all {
            return Err(anyhow!("provide --domain <name> or use --all"));
        }
        let (home, config) = load_context()?;
        let local = LocalProviders::open(&config, &home);
        let scope = SyncScope::from_filter(self.domain.as_deref());
        let options = SyncOptions::new(self.dry_run).with_timeout(config.cycle_timeout());

        let report = pipeline::run(&config, local.providers(), scope, &options)
            .map_err(|e| anyhow!("sync failed [{}]: {e}", e.code()))?;

        if self.json {
            return print_json(&report);
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &CycleReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}{} '{}' synced: {} merged, {} written, {} unchanged, {} dropped, {} duplicate(s)",
        "✓".green(),
        report.scope,
        report.merged,
        report.store_changed(),
        report.store_unchanged(),
        report.issues.len(),
        report.duplicates,
    );

    for write in &report.store_writes {
        if !write.is_unchanged() {
            println!("  {}", describe(write));
        }
    }
    println!("  {} ({} carried row(s))", describe(&report.sheet_write), report.carried_rows);

    for issue in &report.issues {
        println!(
            "  {} {} #{}: {}",
            "⚠".yellow(),
            issue.source,
            issue.index,
            issue.error
        );
    }
}

fn describe(write: &WriteResult) -> String {
    match write {
        WriteResult::Written { key } => format!("✎  {key}"),
        WriteResult::WouldWrite { key } => format!("~  {key}"),
        WriteResult::Unchanged { key } => format!("·  {key}"),
    }
}
