// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Result packager: assembles the `output/` directory, writes the upload
//! manifest for the next allocation, and registers the pending result row in
//! the catalog.

use std::path::{Path, PathBuf};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use model::config::HpcConfig;
use model::manifest::{ManifestError, UploadManifest};
use model::names;
use model::request::JobRequest;

use crate::catalog::{Catalog, CatalogError, ResultRecord};

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to prepare results directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Assemble the results directory and emit the upload manifest.
///
/// Output files are moved into `output/`; a missing output is logged and
/// skipped rather than failing the whole job. The catalog row is inserted
/// last, once the archive's destination is fixed.
pub async fn package(
    request: &JobRequest,
    cfg: &HpcConfig,
    job_dir: &Path,
    outputs: &[PathBuf],
    user_script: Option<&Path>,
    catalog: &dyn Catalog,
) -> Result<UploadManifest, PackageError> {
    let output_dir = job_dir.join(names::OUTPUT_DIR);
    std::fs::create_dir_all(&output_dir)?;

    std::fs::write(
        output_dir.join(names::query_file_name(&request.id)),
        &request.sql_query,
    )?;

    if let Some(script) = user_script {
        let target = output_dir.join(names::user_script_name(&request.id, &request.script_ext()));
        if let Err(err) = std::fs::copy(script, &target) {
            tracing::warn!(script = %script.display(), %err, "failed to preserve user script");
        }
    }

    for output in outputs {
        collect_output(output, &output_dir, job_dir);
    }

    let manifest = build_manifest(request, cfg, job_dir);
    manifest.write_to(&job_dir.join(names::manifest_name(&request.id)))?;

    let upload_date = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    catalog
        .insert_result(&ResultRecord {
            job_id: request.id.clone(),
            s3_key: manifest.s3_key.clone(),
            path: manifest.archive_path.to_string_lossy().into_owned(),
            upload_date,
        })
        .await?;

    Ok(manifest)
}

pub fn build_manifest(request: &JobRequest, cfg: &HpcConfig, job_dir: &Path) -> UploadManifest {
    let archive_name = names::archive_name(&request.id);
    UploadManifest {
        job_id: request.id.clone(),
        output_dir: job_dir.join(names::OUTPUT_DIR),
        logs_dir: job_dir.to_path_buf(),
        archive_path: Path::new(&cfg.pfs_prefix_path).join(&archive_name),
        s3_bucket: cfg.s3_bucket.clone(),
        s3_key: archive_name,
        s3_endpoint_url: cfg.s3_endpoint_url.clone(),
    }
}

/// Bring one output into the results directory. Analysis outputs inside the
/// job directory are moved; anything outside it is a lake input selected by
/// the query and is copied, never taken off the lake.
fn collect_output(output: &Path, output_dir: &Path, job_dir: &Path) {
    if output.parent() == Some(output_dir) {
        return;
    }
    let Some(file_name) = output.file_name() else {
        tracing::warn!(output = %output.display(), "output has no file name, skipping");
        return;
    };
    if !output.exists() {
        tracing::warn!(output = %output.display(), "declared output is missing, skipping");
        return;
    }
    let target = output_dir.join(file_name);
    let result = if output.starts_with(job_dir) {
        std::fs::rename(output, &target)
            .or_else(|_| std::fs::copy(output, &target).map(|_| ()))
    } else {
        std::fs::copy(output, &target).map(|_| ())
    };
    if let Err(err) = result {
        tracing::warn!(output = %output.display(), %err, "failed to collect output");
    }
}
