//! `fleet daemon`: background scheduler and request server.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use fleet_daemon::paths::socket_path;
use fleet_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

use super::print_json;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (scheduler + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Queue a cycle in the running daemon and wait for it.
    Sync(DaemonSyncArgs),
}

#[derive(Args, Debug)]
pub struct DaemonSyncArgs {
    /// Restrict the cycle to one configured domain.
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                print_json(&serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync(args) => {
            let summary = request_sync(&home, args.domain, args.dry_run)
                .context("daemon sync failed")?;
            print_json(&summary)?;
        }
    }

    Ok(())
}
