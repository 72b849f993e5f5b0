//! `fleet init --domain <name> [--domain <name> ...]`

use anyhow::{Context, Result};
use clap::Args;

use fleet_core::{
    config::{self, DomainConfig},
    DomainName,
};

/// Create the Fleet config file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Domain to manage; repeat for several tenants.
    #[arg(long = "domain", short = 'd', required = true)]
    pub domains: Vec<String>,

    /// Directory-service customer id, applied to every listed domain.
    #[arg(long, default_value = "")]
    pub customer_id: String,

    /// Administrative user the directory calls run as (defaults to
    /// `admin@<domain>`).
    #[arg(long)]
    pub admin_user: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let path = config::config_path_at(&home);
        if path.exists() {
            println!("Config already exists at {}; left unchanged.", path.display());
            return Ok(());
        }

        let domains: Vec<DomainConfig> = self
            .domains
            .iter()
            .map(|name| DomainConfig {
                name: DomainName::from(name.trim()),
                customer_id: self.customer_id.clone(),
                admin_user: self
                    .admin_user
                    .clone()
                    .unwrap_or_else(|| format!("admin@{}", name.trim())),
            })
            .collect();

        let created = config::init_at(&home, domains)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!(
            "✓ Wrote {} with {} domain(s)",
            path.display(),
            created.domains.len()
        );
        println!(
            "  Data directory: {}",
            created.data_dir_at(&home).display()
        );
        Ok(())
    }
}
