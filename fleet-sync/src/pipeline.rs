//! Shared reconciliation cycle entrypoint used by CLI and daemon.
//!
//! A cycle runs strictly in order:
//! read inventory → read store → read sheet → merge → write store → write sheet.
//! Any provider failure aborts the whole cycle; a partial merge missing one
//! source would erase augmentation data on the next upsert.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use fleet_core::{config::FleetConfig, DeviceRecord, DomainName};

use crate::error::{ProviderError, Stage, SyncError};
use crate::provider::{Providers, INVENTORY, SHEET, STORE};
use crate::reconcile::reconcile;
use crate::sheet::SheetRow;
use crate::translate::{
    translate_authoritative, translate_batch, translate_sheet_rows, translate_store, RecordIssue,
};
use crate::upsert::{plan_sheet, write_sheet, write_store, WriteResult};

// ---------------------------------------------------------------------------
// Scope and options
// ---------------------------------------------------------------------------

/// Scope for a reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every configured domain, in series.
    All,
    /// A single configured domain.
    Domain(String),
}

impl SyncScope {
    pub fn from_filter(domain: Option<&str>) -> Self {
        match domain {
            Some(d) => SyncScope::Domain(d.to_string()),
            None => SyncScope::All,
        }
    }

    fn filter(&self) -> Option<&str> {
        match self {
            SyncScope::All => None,
            SyncScope::Domain(d) => Some(d),
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::All => f.write_str("all domains"),
            SyncScope::Domain(d) => f.write_str(d),
        }
    }
}

/// Per-invocation knobs.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Checked between external calls.
    pub deadline: Option<Instant>,
    /// Cycle timestamp; drives the humanized last-sync column and the
    /// last-updated stamp.
    pub now: DateTime<Utc>,
}

impl SyncOptions {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            deadline: None,
            now: Utc::now(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Caller-supplied cycle deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(pub Option<Instant>);

impl Deadline {
    pub fn check(&self, stage: Stage, processed: usize) -> Result<(), SyncError> {
        match self.0 {
            Some(at) if Instant::now() >= at => Err(SyncError::DeadlineExceeded { stage, processed }),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle context
// ---------------------------------------------------------------------------

/// The three snapshots one cycle works from. Built per cycle, then dropped.
#[derive(Debug, Clone, Default)]
pub struct CycleContext {
    pub domains: Vec<DomainName>,
    pub authoritative: Vec<DeviceRecord>,
    pub store: Vec<DeviceRecord>,
    /// Raw sheet body, kept for carry-over and change detection.
    pub sheet_rows: Vec<SheetRow>,
    pub sheet: Vec<DeviceRecord>,
    pub issues: Vec<RecordIssue>,
}

/// Read and translate all three sources for `scope`. No writes.
pub fn gather(
    config: &FleetConfig,
    providers: Providers<'_>,
    scope: &SyncScope,
    deadline: &Deadline,
) -> Result<CycleContext, SyncError> {
    let mut ctx = CycleContext {
        domains: config.resolve_scope(scope.filter())?,
        ..Default::default()
    };

    for domain in &ctx.domains {
        let processed = ctx.authoritative.len();
        deadline.check(Stage::FetchInventory, processed)?;
        let natives = providers
            .inventory
            .fetch_devices(domain)
            .map_err(|e| unavailable(INVENTORY, Stage::FetchInventory, processed, e))?;
        let (records, issues) = translate_batch(INVENTORY, &natives, |n| {
            translate_authoritative(n, domain)
        });
        tracing::debug!("{domain}: {} authoritative device(s)", records.len());
        ctx.authoritative.extend(records);
        ctx.issues.extend(issues);
    }

    let processed = ctx.authoritative.len();
    deadline.check(Stage::FetchStore, processed)?;
    let store_filter = match scope {
        SyncScope::Domain(_) => ctx.domains.first(),
        SyncScope::All => None,
    };
    let natives = providers
        .store
        .fetch(store_filter)
        .map_err(|e| unavailable(STORE, Stage::FetchStore, processed, e))?;
    let (records, issues) = translate_batch(STORE, &natives, translate_store);
    ctx.store = records;
    ctx.issues.extend(issues);

    deadline.check(Stage::FetchSheet, processed)?;
    ctx.sheet_rows = providers
        .sheet
        .fetch_rows()
        .map_err(|e| unavailable(SHEET, Stage::FetchSheet, processed, e))?;
    let (records, issues) = translate_sheet_rows(&ctx.sheet_rows);
    ctx.sheet = records;
    ctx.issues.extend(issues);

    Ok(ctx)
}

fn unavailable(
    provider: &'static str,
    stage: Stage,
    processed: usize,
    source: ProviderError,
) -> SyncError {
    SyncError::ProviderUnavailable {
        provider,
        stage,
        processed,
        source,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub scope: String,
    pub domains: Vec<DomainName>,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Authoritative devices read (after translation).
    pub authoritative: usize,
    pub merged: usize,
    pub duplicates: usize,
    #[serde(serialize_with = "serialize_issues")]
    pub issues: Vec<RecordIssue>,
    pub store_writes: Vec<WriteResult>,
    pub sheet_write: WriteResult,
    pub carried_rows: usize,
}

impl CycleReport {
    /// Store entries actually written, or that would be in dry-run mode.
    pub fn store_changed(&self) -> usize {
        self.store_writes.iter().filter(|w| !w.is_unchanged()).count()
    }

    pub fn store_unchanged(&self) -> usize {
        self.store_writes.iter().filter(|w| w.is_unchanged()).count()
    }
}

fn serialize_issues<S: Serializer>(issues: &[RecordIssue], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(
        issues
            .iter()
            .map(|i| format!("{} #{}: {}", i.source, i.index, i.error)),
    )
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run one reconciliation cycle for `scope`.
///
/// This is the canonical entrypoint for both `fleet sync` and the daemon's
/// sync processor.
pub fn run(
    config: &FleetConfig,
    providers: Providers<'_>,
    scope: SyncScope,
    options: &SyncOptions,
) -> Result<CycleReport, SyncError> {
    let deadline = Deadline(options.deadline);
    match run_cycle(config, providers, &scope, options, &deadline) {
        Ok(report) => {
            tracing::info!(
                "sync {}: {} merged, {} store write(s), {} unchanged, {} dropped, {} duplicate(s), sheet {:?}",
                report.scope,
                report.merged,
                report.store_changed(),
                report.store_unchanged(),
                report.issues.len(),
                report.duplicates,
                report.sheet_write
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!("sync {scope} aborted: {e}");
            Err(e)
        }
    }
}

fn run_cycle(
    config: &FleetConfig,
    providers: Providers<'_>,
    scope: &SyncScope,
    options: &SyncOptions,
    deadline: &Deadline,
) -> Result<CycleReport, SyncError> {
    let ctx = gather(config, providers, scope, deadline)?;
    let merged = reconcile(&ctx.authoritative, &ctx.store, &ctx.sheet);

    let store = write_store(providers.store, &merged.merged, options.dry_run, deadline)?;
    let plan = plan_sheet(&store.records, &ctx.sheet_rows, options.now);
    let sheet_write = write_sheet(
        providers.sheet,
        &plan,
        &ctx.sheet_rows,
        options.now,
        options.dry_run,
        store.writes.len(),
        deadline,
    )?;

    Ok(CycleReport {
        scope: scope.to_string(),
        domains: ctx.domains,
        started_at: options.now,
        dry_run: options.dry_run,
        authoritative: ctx.authoritative.len(),
        merged: merged.merged.len(),
        duplicates: merged.duplicates,
        issues: ctx.issues,
        store_writes: store.writes,
        sheet_write,
        carried_rows: plan.carried_rows,
    })
}
