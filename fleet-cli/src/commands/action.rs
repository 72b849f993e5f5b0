//! `fleet action <approve|block|delete|wipe> --domain <d> (--sn <s> | --imei <i>) [--yes]`

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use fleet_sync::{ActionError, ActionExecutor, ActionRequest, LocalProviders};

use super::{load_context, print_json};

/// Arguments for `fleet action`.
#[derive(Args, Debug)]
pub struct ActionArgs {
    /// approve | block | delete | wipe
    pub action: String,

    #[arg(long, short = 'd')]
    pub domain: String,

    /// Serial number of the device.
    #[arg(long)]
    pub sn: Option<String>,

    /// IMEI of the device.
    #[arg(long)]
    pub imei: Option<String>,

    /// Confirm without prompting.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Emit the outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ActionArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_context()?;
        let local = LocalProviders::open(&config, &home);
        let executor = ActionExecutor::new(&config, &local.store, &local.inventory);

        let mut request = ActionRequest {
            action: self.action,
            confirm: false,
            domain: self.domain,
            imei: self.imei.unwrap_or_default(),
            sn: self.sn.unwrap_or_default(),
            key: None,
        };

        let prepared = executor.prepare(&request).map_err(rejected)?;
        request.confirm = if self.yes {
            true
        } else {
            let device = &prepared.device;
            prompt(&format!(
                "{} {} ({}, {}) in {}?",
                prepared.remote,
                if device.serial_number.is_empty() { &device.imei } else { &device.serial_number },
                device.owner_name,
                device.status,
                prepared.domain
            ))?
        };

        let outcome = executor.execute(&request).map_err(rejected)?;
        if self.json {
            return print_json(&outcome);
        }
        println!(
            "{} {} issued for {} ({}) in {}",
            "✓".green(),
            outcome.remote_action,
            if outcome.serial_number.is_empty() { &outcome.imei } else { &outcome.serial_number },
            outcome.owner_email,
            outcome.domain
        );
        Ok(())
    }
}

fn rejected(err: ActionError) -> anyhow::Error {
    anyhow!("action rejected [{}]: {err}", err.code())
}

/// Ask a y/N question on the terminal; anything but `y`/`yes` is a no.
fn prompt(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
