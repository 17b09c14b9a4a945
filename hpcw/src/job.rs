// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! HPC-side entry point: payload intake, config override merge, query
//! execution and dispatch to the analysis runners.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use model::config::{HpcConfig, Settings};
use model::names;
use model::request::{Analysis, JobRequest};

use crate::catalog::{Catalog, MongoCatalog};
use crate::packager;
use crate::runner::{code, container};
use crate::translate;

pub async fn run(payload_path: &Path, config_path: Option<PathBuf>) -> Result<()> {
    let payload_path = std::fs::canonicalize(payload_path)
        .with_context(|| format!("payload not found at {}", payload_path.display()))?;
    let job_dir = payload_path
        .parent()
        .context("payload has no parent directory")?
        .to_path_buf();

    let raw = std::fs::read_to_string(&payload_path)
        .with_context(|| format!("failed to read payload {}", payload_path.display()))?;
    let request = JobRequest::from_json(&raw)?;
    tracing::info!(id = %request.id, "starting analysis job");

    let mut cfg = Settings::load(config_path)?.require_hpc()?;
    if let Some(overrides) = &request.config_hpc {
        cfg.apply_overrides(overrides)?;
    }

    let query = translate::translate(&request.sql_query)?;
    tracing::debug!(filter = %query.filter, "translated query");

    let catalog = MongoCatalog::connect(&cfg).await?;
    let inputs = catalog.find_paths(&query).await?;
    tracing::info!(matched = inputs.len(), "catalog query finished");

    let (outputs, user_script) = run_analysis(&request, &cfg, &job_dir, &inputs).await?;

    packager::package(
        &request,
        &cfg,
        &job_dir,
        &outputs,
        user_script.as_deref(),
        &catalog,
    )
    .await?;
    tracing::info!(id = %request.id, "results packaged");
    Ok(())
}

async fn run_analysis(
    request: &JobRequest,
    cfg: &HpcConfig,
    job_dir: &Path,
    inputs: &[String],
) -> Result<(Vec<PathBuf>, Option<PathBuf>)> {
    let output_dir = job_dir.join(names::OUTPUT_DIR);
    match request.analysis() {
        Analysis::PassThrough => {
            let outputs = inputs.iter().map(PathBuf::from).collect();
            Ok((outputs, None))
        }
        Analysis::Script { path } => {
            let staged = staged_artifact(job_dir, &path)?;
            let script = code::persist_user_script(&staged, job_dir, &request.script_ext())?;
            let outputs = code::run(&script, job_dir, inputs).await?;
            Ok((outputs, Some(script)))
        }
        Analysis::ContainerImage { path } => {
            let image = staged_artifact(job_dir, &path)?;
            let outputs = run_container(request, cfg, &image, inputs, &output_dir).await?;
            Ok((outputs, None))
        }
        Analysis::ContainerUrl { .. } => {
            // built into the job directory by the auxiliary build job
            let image = job_dir.join(names::container_image_name(&request.id));
            let outputs = run_container(request, cfg, &image, inputs, &output_dir).await?;
            Ok((outputs, None))
        }
    }
}

async fn run_container(
    request: &JobRequest,
    cfg: &HpcConfig,
    image: &Path,
    inputs: &[String],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let invocation = container::build_invocation(
        cfg,
        image,
        request.exec_command.as_deref(),
        inputs,
        output_dir,
    );
    tracing::debug!(?invocation, "running container analysis");
    Ok(container::run(&invocation, output_dir).await?)
}

/// The staged artifact keeps its original file name inside the job
/// directory, whatever path the caller staged it from.
fn staged_artifact(job_dir: &Path, original: &str) -> Result<PathBuf> {
    let name = Path::new(original)
        .file_name()
        .with_context(|| format!("artifact path '{original}' has no file name"))?;
    let staged = job_dir.join(name);
    anyhow::ensure!(
        staged.is_file(),
        "staged artifact missing at {}",
        staged.display()
    );
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn staged_artifact_resolves_basename() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("reduce.py"), b"code").unwrap();

        let staged = staged_artifact(dir.path(), "/home/caller/reduce.py").unwrap();
        assert_eq!(staged, dir.path().join("reduce.py"));
    }

    #[test]
    fn staged_artifact_missing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = staged_artifact(dir.path(), "/home/caller/ghost.py").unwrap_err();
        assert!(err.to_string().contains("staged artifact missing"));
    }
}
