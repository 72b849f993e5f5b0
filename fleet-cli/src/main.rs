//! Fleet: mobile device inventory reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! fleet init --domain <name> [--domain <name> ...]
//! fleet domains [-v]
//! fleet sync (--domain <name> | --all) [--dry-run] [--json]
//! fleet diff [--domain <name>]
//! fleet search <qtype> [q] [--domain <name>] [--json]
//! fleet directory <email|name> <q> [--domain <name>] [--json]
//! fleet action <approve|block|delete|wipe> --domain <name> (--sn <sn> | --imei <imei>) [--yes]
//! fleet daemon start|stop|status|sync
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    action::ActionArgs, daemon::DaemonCommand, diff::DiffArgs, directory::DirectoryArgs,
    domains::DomainsArgs, init::InitArgs, search::SearchArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "fleet",
    version,
    about = "Reconcile managed mobile devices across inventory, store and spreadsheet",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.fleet/config.yaml listing the managed domains.
    Init(InitArgs),

    /// List configured domains.
    Domains(DomainsArgs),

    /// Run one reconciliation cycle.
    Sync(SyncArgs),

    /// Show a unified diff of the spreadsheet body a sync would write.
    Diff(DiffArgs),

    /// Search canonical device records.
    Search(SearchArgs),

    /// Phone directory lookup by owner email or name.
    Directory(DirectoryArgs),

    /// Approve, block, delete or wipe a single device.
    Action(ActionArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Domains(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Search(args) => args.run(),
        Commands::Directory(args) => args.run(),
        Commands::Action(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
