// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rakaia - write and tail streams through the rakaia daemon

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, stream};
use rakaia_daemon::Config;
use tracing_subscriber::EnvFilter;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "rakaia",
    version,
    about = "Rakaia - tailable on-disk streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload stdin to a stream
    Put(stream::PutArgs),
    /// Copy a stream to stdout, following it until the writer closes
    Get(stream::GetArgs),
    /// Mint a write token for a stream
    Token(stream::TokenArgs),
    /// List streams that are being written
    List(stream::ListArgs),
    /// Show daemon status
    Status {
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    // Daemon management and status don't auto-start the daemon
    let command = match cli.command {
        Commands::Daemon(args) => return daemon::daemon(args, &config).await,
        Commands::Status { output } => return daemon::status(&config, output).await,
        command => command,
    };

    let client = DaemonClient::connect_or_start(&config).await?;

    match command {
        Commands::Put(args) => stream::put(&client, args).await,
        Commands::Get(args) => stream::get(&client, args).await,
        Commands::Token(args) => stream::token(&client, args).await,
        Commands::List(args) => stream::list(&client, args).await,
        Commands::Status { .. } | Commands::Daemon(_) => Ok(()),
    }
}
