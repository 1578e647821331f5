// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tally - locks, gapless sequences and idempotency records from the shell

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{lock, record, sequence};
use std::path::PathBuf;
use tally_adapters::TracedLockStore;
use tally_core::TallyConfig;
use tally_engine::Coordinator;
use tally_storage::FileStore;
use tracing::debug;

use crate::error::TallyError;
use crate::output::OutputFormat;

/// Store every command runs against
pub type Store = TracedLockStore<FileStore>;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Tally - locks, gapless sequences and idempotency over a shared store"
)]
struct Cli {
    /// Shared store file
    #[arg(
        long,
        global = true,
        env = "TALLY_STORE",
        default_value = ".tally/store.json"
    )]
    store: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue the next invoice number for an organization and document type
    Next(sequence::ScopeArgs),
    /// Show the last issued invoice number without advancing it
    Current(sequence::ScopeArgs),
    /// Lock management
    Lock(lock::LockArgs),
    /// Idempotency records
    Record(record::RecordArgs),
}

#[tokio::main]
async fn main() {
    setup_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<TallyError>() {
            Some(err) => eprint!("{}", err),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TallyConfig::load(path)?,
        None => TallyConfig::default(),
    };
    debug!(store = %cli.store.display(), config = ?cli.config, "opening store");
    let store = TracedLockStore::new(FileStore::open(cli.store.clone()));
    let tally = Coordinator::new(store, config);
    let format = cli.output;

    match cli.command {
        Commands::Next(args) => sequence::next(&tally, args, format).await,
        Commands::Current(args) => sequence::current(&tally, args, format).await,
        Commands::Lock(args) => lock::handle(&tally, args.command, format).await,
        Commands::Record(args) => record::handle(&tally, args.command, format).await,
    }
}

/// Log to stderr so stdout stays machine-readable
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
