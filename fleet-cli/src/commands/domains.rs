//! `fleet domains [-v]`

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use super::{load_context, print_json};

#[derive(Args, Debug)]
pub struct DomainsArgs {
    /// Show customer id and admin user.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct DomainRow {
    #[tabled(rename = "domain")]
    name: String,
    #[tabled(rename = "customer id")]
    customer_id: String,
    #[tabled(rename = "admin user")]
    admin_user: String,
}

impl DomainsArgs {
    pub fn run(self) -> Result<()> {
        let (_home, config) = load_context()?;

        if self.json {
            return print_json(&config.domains);
        }
        if config.domains.is_empty() {
            println!("No domains configured.");
            return Ok(());
        }
        if !self.verbose {
            for domain in &config.domains {
                println!("{}", domain.name);
            }
            return Ok(());
        }

        let rows: Vec<DomainRow> = config
            .domains
            .iter()
            .map(|d| DomainRow {
                name: d.name.to_string(),
                customer_id: d.customer_id.clone(),
                admin_user: d.admin_user.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
