//! `fleet directory <email|name> <q>`

use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fleet_core::query::SearchRequest;
use fleet_sync::{lookup, LocalProviders};

use super::{load_context, print_json};

/// Arguments for `fleet directory`.
#[derive(Args, Debug)]
pub struct DirectoryArgs {
    /// email | name
    pub qtype: String,

    pub q: String,

    /// Restrict to one configured domain.
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    /// Emit entries as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "phone")]
    phone_number: String,
}

impl DirectoryArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_context()?;
        let local = LocalProviders::open(&config, &home);
        let request = SearchRequest {
            qtype: self.qtype,
            q: self.q,
            domain: self.domain,
            key: None,
        };

        let found = lookup::directory(&config, &local.store, &request)
            .map_err(|e| anyhow!("directory lookup failed [{}]: {e}", e.code()))?;

        if self.json {
            return print_json(&found.entries);
        }
        if found.entries.is_empty() {
            println!("No directory entries.");
        } else {
            let rows: Vec<EntryRow> = found
                .entries
                .into_iter()
                .map(|e| EntryRow {
                    name: e.name,
                    email: e.email,
                    phone_number: e.phone_number,
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        if found.malformed > 0 {
            println!(
                "{} skipped {} device(s) with a malformed phone number",
                "⚠".yellow(),
                found.malformed
            );
        }
        Ok(())
    }
}
