// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod catalog;
mod job;
mod packager;
mod runner;
mod translate;

/// HPC-side worker: executes a staged analysis request inside a compute
/// allocation.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Path to the staged request payload (JSON).
    payload: PathBuf,

    /// Path to the basin config file holding the [hpc] profile.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BASIN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let opts = Opts::parse();
    job::run(&opts.payload, opts.config).await
}
