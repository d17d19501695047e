// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rakaia put|get|token|list|status` - stream commands

use anyhow::Result;
use clap::Args;
use rakaia_core::StreamId;
use rakaia_daemon::protocol::ReadMode;
use rakaia_daemon::StreamState;
use serde::Serialize;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct PutArgs {
    /// Stream id (e.g., "build-42/console")
    pub id: StreamId,

    /// Write token; minted from the daemon when omitted
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Stream id
    pub id: StreamId,

    /// Print line by line instead of raw chunks; a final unterminated line
    /// is printed with a newline
    #[arg(long)]
    pub lines: bool,

    /// Wait for the stream to start instead of failing when it is unknown
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args)]
pub struct TokenArgs {
    /// Stream id
    pub id: StreamId,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

/// Upload stdin
pub async fn put(client: &DaemonClient, args: PutArgs) -> Result<()> {
    let token = match args.token {
        Some(token) => token,
        None => client.mint_token(&args.id).await?,
    };

    let bytes = client.upload(&args.id, token, tokio::io::stdin()).await?;
    eprintln!("Wrote {} bytes to {}", bytes, args.id);
    Ok(())
}

/// Copy a stream to stdout until its writer closes
pub async fn get(client: &DaemonClient, args: GetArgs) -> Result<()> {
    let mode = if args.lines {
        ReadMode::Lines
    } else {
        ReadMode::Chunks
    };

    let mut stdout = tokio::io::stdout();
    client
        .download(&args.id, mode, args.wait, &mut stdout)
        .await?;
    Ok(())
}

pub async fn token(client: &DaemonClient, args: TokenArgs) -> Result<()> {
    println!("{}", client.mint_token(&args.id).await?);
    Ok(())
}

pub async fn list(client: &DaemonClient, args: ListArgs) -> Result<()> {
    let streams = client.list_streams().await?;

    output::print(&streams, args.output, |streams| {
        if streams.is_empty() {
            println!("No active streams");
            return;
        }
        println!("{:<40} {:<8} BYTES", "STREAM", "STATE");
        for s in streams {
            let state = match s.state {
                StreamState::Writing => "writing",
                StreamState::Closed => "closed",
            };
            println!("{:<40} {:<8} {}", s.id, state, s.bytes);
        }
    })
}

#[derive(Serialize)]
struct Status {
    version: String,
    uptime_secs: u64,
    streams_active: usize,
    streams_finished: u64,
}

pub async fn status(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let version = client.hello().await?;
    let (uptime_secs, streams_active, streams_finished) = client.status().await?;
    let status = Status {
        version,
        uptime_secs,
        streams_active,
        streams_finished,
    };

    output::print(&status, format, |s| {
        println!("Status: running");
        println!("  Version: {}", s.version);
        println!("  Uptime: {}s", s.uptime_secs);
        println!("  Streams active: {}", s.streams_active);
        println!("  Streams finished: {}", s.streams_finished);
    })
}
