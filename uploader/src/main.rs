// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Uploader: consumes the manifest written by the worker, packages the
//! results directory and ships the archive to the object store. Runs inside
//! the dependent upload allocation; a non-zero exit halts the batch chain.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use model::manifest::UploadManifest;

mod archive;
mod s3;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Path to the upload manifest emitted by the worker.
    manifest: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BASIN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let opts = Opts::parse();
    let manifest = UploadManifest::read_from(&opts.manifest)?;
    tracing::info!(id = %manifest.job_id, "uploading results");

    let copied = archive::copy_scheduler_logs(&manifest.logs_dir, &manifest.output_dir)?;
    tracing::debug!(copied, "collected scheduler logs");

    archive::create_archive(&manifest.output_dir, &manifest.archive_path)?;
    tracing::info!(archive = %manifest.archive_path.display(), "archive created");

    std::fs::remove_dir_all(&manifest.output_dir).with_context(|| {
        format!(
            "failed to remove results directory {}",
            manifest.output_dir.display()
        )
    })?;

    let store = s3::ResultStore::new(&manifest.s3_endpoint_url, s3::S3Credentials::from_env())?;
    store
        .upload_archive(&manifest.s3_bucket, &manifest.s3_key, &manifest.archive_path)
        .await?;
    tracing::info!(
        bucket = %manifest.s3_bucket,
        key = %manifest.s3_key,
        "archive uploaded and visible"
    );
    Ok(())
}
