//! Dry-run unified diff support for `fleet diff`.

use chrono::{DateTime, Utc};
use similar::TextDiff;

use fleet_core::config::FleetConfig;

use crate::error::SyncError;
use crate::pipeline::{gather, Deadline, SyncScope};
use crate::provider::Providers;
use crate::reconcile::reconcile;
use crate::sheet::SheetRow;
use crate::upsert::{plan_sheet, write_store};

/// What a cycle would change, without changing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDiff {
    pub scope: String,
    /// Unified diff of the sheet body; empty when nothing would change.
    pub unified_diff: String,
    /// Canonical store entries that would be written.
    pub store_pending: usize,
}

impl SheetDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty() && self.store_pending == 0
    }
}

/// Run the read and merge half of a cycle and diff the sheet body it would
/// write against the current one.
///
/// No provider write is issued. The last-updated stamp is not part of the
/// body and never shows up in the diff.
pub fn diff_sheet(
    config: &FleetConfig,
    providers: Providers<'_>,
    scope: SyncScope,
    now: DateTime<Utc>,
) -> Result<SheetDiff, SyncError> {
    let deadline = Deadline::default();
    let ctx = gather(config, providers, &scope, &deadline)?;
    let merged = reconcile(&ctx.authoritative, &ctx.store, &ctx.sheet);
    let store = write_store(providers.store, &merged.merged, true, &deadline)?;
    let plan = plan_sheet(&store.records, &ctx.sheet_rows, now);

    let existing = render(&ctx.sheet_rows);
    let planned = render(&plan.rows);
    let unified_diff = if existing == planned {
        String::new()
    } else {
        TextDiff::from_lines(&existing, &planned)
            .unified_diff()
            .header("a/sheet", "b/sheet")
            .context_radius(3)
            .to_string()
    };

    Ok(SheetDiff {
        scope: scope.to_string(),
        unified_diff,
        store_pending: store.writes.iter().filter(|w| !w.is_unchanged()).count(),
    })
}

fn render(rows: &[SheetRow]) -> String {
    rows.iter().map(|r| r.to_line() + "\n").collect()
}
