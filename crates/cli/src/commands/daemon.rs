// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rakaia daemon start|stop|status` - daemon management

use anyhow::Result;
use clap::{Args, Subcommand};
use rakaia_daemon::Config;

use crate::client::{self, ClientError, DaemonClient};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start {
        /// Run in the foreground instead (logs still go to the log file)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status {
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },
}

pub async fn daemon(args: DaemonArgs, config: &Config) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(config, foreground).await,
        DaemonCommand::Stop => stop(config).await,
        DaemonCommand::Status { output } => status(config, output).await,
    }
}

async fn start(config: &Config, foreground: bool) -> Result<()> {
    if DaemonClient::connect(config).is_ok() {
        println!("Daemon already running");
        return Ok(());
    }

    if foreground {
        let status = std::process::Command::new(client::find_daemon_binary()).status()?;
        if !status.success() {
            anyhow::bail!("rakaiad exited with {}", status);
        }
        return Ok(());
    }

    let child = client::start_daemon_background()?;
    DaemonClient::connect_with_retry(config, client::timeout_connect(), child).await?;
    println!("Daemon started");
    Ok(())
}

async fn stop(config: &Config) -> Result<()> {
    if client::daemon_stop(config).await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

pub async fn status(config: &Config, output: OutputFormat) -> Result<()> {
    let client = match DaemonClient::connect(config) {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // A socket file with nobody listening is a daemon that died uncleanly
    match crate::commands::stream::status(&client, output).await {
        Ok(()) => Ok(()),
        Err(e) if is_connect_refused(&e) => {
            println!("Daemon not running (stale socket at {})", config.socket_path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_connect_refused(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::Io(e)) if matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
        )
    )
}
