// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! The five ordered staging steps performed per request: create the remote
//! job directory, stage the payload, stage (or schedule the build of) the
//! user artifact, submit the compute job, submit the dependent upload job.
//!
//! Requests are single-shot: an existing job directory fails the request, and
//! any later failure leaves the directory in place for inspection.

use std::path::Path;
use thiserror::Error;

use model::config::{HpcConfig, ServerConfig};
use model::names;
use model::request::{Analysis, JobRequest};

use crate::sbatch;
use crate::ssh::SessionManager;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("job directory {0} already exists; requests are single-shot")]
    DirectoryExists(String),

    #[error("staging step '{step}' failed: {stdout}{stderr}")]
    StageFailed {
        step: &'static str,
        stdout: String,
        stderr: String,
    },

    #[error("could not parse a scheduler id from sbatch acknowledgement: {ack}")]
    SubmitFailed { ack: String },

    #[error("image build submission failed: {stdout}{stderr}")]
    BuildFailed { stdout: String, stderr: String },

    #[error("remote session error: {0}")]
    Session(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub job_dir: String,
    pub build_job_id: Option<i64>,
    pub compute_job_id: i64,
    pub upload_job_id: i64,
}

/// Run all five steps, returning the scheduler ids of the submitted chain.
pub async fn stage_and_submit(
    session: &SessionManager,
    server: &ServerConfig,
    hpc: &HpcConfig,
    request: &JobRequest,
) -> Result<StageOutcome, StageError> {
    let job_dir = names::job_dir(&hpc.pfs_prefix_path, &request.id);

    // 1. remote job directory, keyed by the request id
    if session.dir_exists(&job_dir).await? {
        return Err(StageError::DirectoryExists(job_dir));
    }
    session.create_dir(&job_dir).await?;
    tracing::info!(id = %request.id, dir = %job_dir, "created remote job directory");

    // 2. request payload
    let payload = serde_json::to_vec_pretty(request).unwrap_or_default();
    let payload_remote = format!("{job_dir}/{}", names::payload_file_name(&request.id));
    session.write_file(&payload_remote, &payload).await?;

    // 3. user artifact (file transfer) or auxiliary build job (remote url)
    let build_job_id = stage_artifact(session, server, request, &job_dir).await?;

    // 4. compute job, chained on the build job when one exists
    let compute_cmd =
        sbatch::build_compute_command(server, hpc, &request.id, &job_dir, build_job_id);
    let compute_job_id = submit(session, "submit compute job", &compute_cmd).await?;
    tracing::info!(id = %request.id, compute_job_id, "compute job submitted");

    // 5. upload job with a successor-dependency on the compute job
    let upload_cmd =
        sbatch::build_upload_command(server, &request.id, &job_dir, compute_job_id);
    let upload_job_id = submit(session, "submit upload job", &upload_cmd).await?;
    tracing::info!(id = %request.id, upload_job_id, "upload job submitted");

    Ok(StageOutcome {
        job_dir,
        build_job_id,
        compute_job_id,
        upload_job_id,
    })
}

async fn stage_artifact(
    session: &SessionManager,
    server: &ServerConfig,
    request: &JobRequest,
    job_dir: &str,
) -> Result<Option<i64>, StageError> {
    match request.analysis() {
        Analysis::PassThrough => Ok(None),
        Analysis::Script { path } | Analysis::ContainerImage { path } => {
            let local = Path::new(&path);
            let remote = format!("{job_dir}/{}", artifact_file_name(local, &request.id));
            session.upload_file(local, &remote).await?;
            tracing::info!(id = %request.id, %remote, "staged user artifact");
            Ok(None)
        }
        Analysis::ContainerUrl { url } => {
            let build_cmd = sbatch::build_image_command(server, &request.id, job_dir, &url);
            let (out, err, code) = session.exec_capture(&build_cmd).await?;
            if code != 0 {
                return Err(StageError::BuildFailed {
                    stdout: String::from_utf8_lossy(&out).into_owned(),
                    stderr: String::from_utf8_lossy(&err).into_owned(),
                });
            }
            let ack = String::from_utf8_lossy(&out).into_owned();
            let build_id = sbatch::parse_job_id(&ack)
                .ok_or(StageError::SubmitFailed { ack })?;
            tracing::info!(id = %request.id, build_id, "image build job submitted");
            Ok(Some(build_id))
        }
    }
}

async fn submit(
    session: &SessionManager,
    step: &'static str,
    command: &str,
) -> Result<i64, StageError> {
    let (out, err, code) = session.exec_capture(command).await?;
    if code != 0 {
        return Err(StageError::StageFailed {
            step,
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        });
    }
    let ack = String::from_utf8_lossy(&out).into_owned();
    sbatch::parse_job_id(&ack).ok_or(StageError::SubmitFailed { ack })
}

/// Artifacts keep their original file name; a caller path with no usable
/// name falls back to a derived one.
fn artifact_file_name(local: &Path, id: &str) -> String {
    local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("artifact_{id}"))
}
