//! `fleet search <qtype> [q]`

use anyhow::{anyhow, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use fleet_core::{normalize::format_phone, query::SearchRequest, DeviceRecord};
use fleet_sync::{lookup, LocalProviders};

use super::{load_context, print_json};

/// Arguments for `fleet search`.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// all | email | imei | name | notes | phone | sn | status
    pub qtype: String,

    /// Search term; required unless qtype is `all`.
    #[arg(default_value = "")]
    pub q: String,

    /// Restrict to one configured domain.
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    /// Emit matching records as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "domain")]
    domain: String,
    #[tabled(rename = "serial")]
    serial_number: String,
    #[tabled(rename = "imei")]
    imei: String,
    #[tabled(rename = "owner")]
    owner: String,
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "phone")]
    phone: String,
    #[tabled(rename = "notes")]
    notes: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(r: &DeviceRecord) -> Self {
        let phone = &r.augmentation.phone_number;
        Self {
            domain: r.domain.to_string(),
            serial_number: r.serial_number.clone(),
            imei: r.imei.clone(),
            owner: r.owner_name.clone(),
            email: r.owner_email.clone(),
            status: r.status.clone(),
            phone: format_phone(phone).unwrap_or_else(|_| phone.clone()),
            notes: r.augmentation.notes.clone(),
        }
    }
}

impl SearchArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_context()?;
        let local = LocalProviders::open(&config, &home);
        let request = SearchRequest {
            qtype: self.qtype,
            q: self.q,
            domain: self.domain,
            key: None,
        };

        let records = lookup::search(&config, &local.store, &request)
            .map_err(|e| anyhow!("search failed [{}]: {e}", e.code()))?;

        if self.json {
            return print_json(&records);
        }
        if records.is_empty() {
            println!("No matching devices.");
            return Ok(());
        }
        let rows: Vec<DeviceRow> = records.iter().map(DeviceRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} device(s)", records.len());
        Ok(())
    }
}
