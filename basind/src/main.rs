// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Control node: accepts a job request, stages it onto the HPC login node
//! and submits the compute + upload batch chain. Invoked by the REST tier
//! fronting the system.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use model::config::Settings;
use model::request::JobRequest;
use model::state::JobState;

mod sbatch;
mod ssh;
mod stage;
mod store;

const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Path to the basin config file holding the [server] and [hpc] profiles.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SSH port of the login node.
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    ssh_port: u16,

    /// Submission database location.
    #[arg(long)]
    database_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stage a job request (JSON payload) and submit its batch chain.
    Submit { request: PathBuf },
    /// Show the recorded submission for a request id.
    Status { request_id: String },
    /// List all recorded submissions.
    List,
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
    let store = open_store(opts.database_path.clone()).await?;

    match &opts.command {
        Command::Submit { request } => submit(&opts, &store, request).await,
        Command::Status { request_id } => {
            let record = store.get(request_id).await?;
            println!("{}", render_record(&record));
            Ok(())
        }
        Command::List => {
            for record in store.list().await? {
                println!("{}", render_record(&record));
            }
            Ok(())
        }
    }
}

async fn submit(
    opts: &Opts,
    store: &store::SubmissionStore,
    request_path: &PathBuf,
) -> anyhow::Result<()> {
    let settings = Settings::load(opts.config.clone())?;
    let mut server = settings
        .server
        .clone()
        .context("config file has no [server] profile")?;
    let mut hpc = settings.hpc.context("config file has no [hpc] profile")?;

    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("failed to read request {}", request_path.display()))?;
    let request = JobRequest::from_json(&raw)?;
    if let Some(overrides) = &request.config_server {
        server.apply_overrides(overrides)?;
    }
    if let Some(overrides) = &request.config_hpc {
        hpc.apply_overrides(overrides)?;
    }

    let session = ssh::SessionManager::new(ssh::SshParams {
        host: server.host.clone(),
        port: opts.ssh_port,
        username: server.user.clone(),
        identity_path: server.ssh_key_path(),
        keepalive_secs: 60,
    });

    let outcome = stage::stage_and_submit(&session, &server, &hpc, &request).await?;
    session.shutdown().await;

    store
        .insert(&store::NewSubmission {
            request_id: request.id.clone(),
            build_job_id: outcome.build_job_id,
            compute_job_id: outcome.compute_job_id,
            upload_job_id: outcome.upload_job_id,
            state: JobState::UploadQueued,
        })
        .await?;

    match outcome.build_job_id {
        Some(build_id) => println!(
            "request {} staged at {}: build job {}, compute job {}, upload job {}",
            request.id, outcome.job_dir, build_id, outcome.compute_job_id, outcome.upload_job_id
        ),
        None => println!(
            "request {} staged at {}: compute job {}, upload job {}",
            request.id, outcome.job_dir, outcome.compute_job_id, outcome.upload_job_id
        ),
    }
    Ok(())
}

fn render_record(record: &store::SubmissionRecord) -> String {
    let build = record
        .build_job_id
        .map(|id| format!(" build={id}"))
        .unwrap_or_default();
    format!(
        "{} state={}{} compute={} upload={} created={}",
        record.request_id,
        record.state,
        build,
        record.compute_job_id,
        record.upload_job_id,
        record.created_at
    )
}

async fn open_store(path: Option<PathBuf>) -> anyhow::Result<store::SubmissionStore> {
    let path = match path {
        Some(path) => path,
        None => {
            let base = dirs::data_dir().context("failed to resolve data directory")?;
            let dir = base.join("basin");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir.join("basind.sqlite")
        }
    };
    Ok(store::SubmissionStore::open(&path).await?)
}
