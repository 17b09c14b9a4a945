// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Batch command composition and acknowledgement parsing.
//!
//! Everything interpolated here is a configuration value that has passed its
//! key's shape check, a validated request id, or a path derived from the
//! validated scratch root; paths are additionally shell-escaped.

use model::config::{HpcConfig, ServerConfig};
use model::names;

use crate::ssh::sh_escape;

/// Command that submits the compute job running the HPC worker over the
/// staged payload, then touches the completion sentinel.
pub fn build_compute_command(
    server: &ServerConfig,
    hpc: &HpcConfig,
    id: &str,
    job_dir: &str,
    build_dependency: Option<i64>,
) -> String {
    let payload = format!("{job_dir}/{}", names::payload_file_name(id));

    let mut body = Vec::new();
    let modules = hpc.module_list();
    if !modules.is_empty() {
        body.push(format!("module load {}", modules.join(" ")));
    }
    body.push(format!("source {}/bin/activate", server.venv_path));
    body.push(format!("export OMP_NUM_THREADS={}", hpc.omp_num_threads));
    body.push(format!("hpcw {}", sh_escape(&payload)));
    body.push(format!("touch {}", names::JOB_DONE_SENTINEL));
    let body = body.join(" && ");

    let mut cmd = format!(
        "sbatch --job-name compute_{id} --chdir {} --partition {} --account {}",
        sh_escape(job_dir),
        server.compute_partition,
        server.account
    );
    if let Some(qos) = &server.qos {
        cmd.push_str(&format!(" --qos {qos}"));
    }
    cmd.push_str(&format!(
        " --time {} --nodes {} --ntasks-per-node {} --cpus-per-task {}",
        server.walltime, server.nodes, server.tasks_per_node, server.cpus_per_task
    ));
    if let Some(mail) = &server.mail {
        cmd.push_str(&format!(" --mail-user {mail} --mail-type END,FAIL"));
    }
    if let Some(build_id) = build_dependency {
        cmd.push_str(&format!(" --dependency afterok:{build_id}"));
    }
    cmd.push_str(&format!(" --wrap {}", sh_escape(&body)));
    cmd
}

/// Command that submits the auxiliary image build job for a remote container
/// reference.
pub fn build_image_command(
    server: &ServerConfig,
    id: &str,
    job_dir: &str,
    container_url: &str,
) -> String {
    let body = format!(
        "singularity build {} {}",
        names::container_image_name(id),
        sh_escape(container_url)
    );
    format!(
        "sbatch --job-name build_{id} --chdir {} --partition {} --account {} --time {} --wrap {}",
        sh_escape(job_dir),
        server.compute_partition,
        server.account,
        server.walltime,
        sh_escape(&body)
    )
}

/// Command that submits the upload job with a successor-dependency on the
/// compute job: run the uploader over the manifest, touch the sentinel, drop
/// the scratch directory.
pub fn build_upload_command(
    server: &ServerConfig,
    id: &str,
    job_dir: &str,
    compute_dependency: i64,
) -> String {
    let body = format!(
        "uploader {} && touch {} && cd .. && rm -rf {}",
        names::manifest_name(id),
        names::RESULTS_UPLOADED_SENTINEL,
        sh_escape(job_dir)
    );
    format!(
        "sbatch --job-name upload_{id} --chdir {} --partition {} --account {} --time {} \
         --dependency afterok:{compute_dependency} --wrap {}",
        sh_escape(job_dir),
        server.upload_partition,
        server.account,
        server.walltime,
        sh_escape(&body)
    )
}

/// Extract the scheduler id from an sbatch acknowledgement like
/// "Submitted batch job 11".
pub fn parse_job_id(ack: &str) -> Option<i64> {
    let marker = "job ";
    let idx = ack.find(marker)?;
    ack[idx + marker.len()..].trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerConfig {
        ServerConfig {
            user: "submitter".to_string(),
            host: "login.hpc.example.org".to_string(),
            compute_partition: "compute".to_string(),
            upload_partition: "transfer".to_string(),
            account: "lake_proj".to_string(),
            qos: Some("normal".to_string()),
            debug: None,
            venv_path: "/opt/venvs/analysis".to_string(),
            ssh_key: "~/keys/id_ed25519".to_string(),
            mail: None,
            walltime: "05:00:00".to_string(),
            nodes: "2".to_string(),
            tasks_per_node: "4".to_string(),
            cpus_per_task: "8".to_string(),
        }
    }

    fn hpc() -> HpcConfig {
        HpcConfig {
            user: "lake".to_string(),
            password: "pw".to_string(),
            ip: "10.0.0.12".to_string(),
            port: "27017".to_string(),
            database: "datalake".to_string(),
            collection: "entries".to_string(),
            s3_bucket: "lake-results".to_string(),
            s3_endpoint_url: "https://s3.example.org:9000".to_string(),
            pfs_prefix_path: "/lustre/lake".to_string(),
            omp_num_threads: "8".to_string(),
            mpi_np: "4".to_string(),
            modules: "[gcc/11.2, singularity]".to_string(),
        }
    }

    #[test]
    fn compute_command_composes_wrap_body() {
        let cmd = build_compute_command(&server(), &hpc(), "A", "/lustre/lake/A", None);
        assert!(cmd.starts_with("sbatch --job-name compute_A --chdir '/lustre/lake/A'"));
        assert!(cmd.contains("--partition compute --account lake_proj --qos normal"));
        assert!(cmd.contains("--time 05:00:00 --nodes 2 --ntasks-per-node 4 --cpus-per-task 8"));
        assert!(cmd.contains("module load gcc/11.2 singularity"));
        assert!(cmd.contains("source /opt/venvs/analysis/bin/activate"));
        assert!(cmd.contains("export OMP_NUM_THREADS=8"));
        assert!(cmd.contains("hpcw '/lustre/lake/A/request_A.json'"));
        assert!(cmd.contains("touch JOB_DONE"));
        assert!(!cmd.contains("--dependency"));
        assert!(!cmd.contains("--mail-user"));
    }

    #[test]
    fn compute_command_chains_on_build_job() {
        let cmd = build_compute_command(&server(), &hpc(), "A", "/lustre/lake/A", Some(41));
        assert!(cmd.contains("--dependency afterok:41"));
    }

    #[test]
    fn compute_command_skips_empty_module_list() {
        let mut hpc = hpc();
        hpc.modules = "[]".to_string();
        let cmd = build_compute_command(&server(), &hpc, "A", "/lustre/lake/A", None);
        assert!(!cmd.contains("module load"));
    }

    #[test]
    fn build_command_targets_the_image_name() {
        let cmd = build_image_command(&server(), "A", "/lustre/lake/A", "docker://img:latest");
        assert!(cmd.contains("--job-name build_A"));
        assert!(cmd.contains("singularity build container_A.sif 'docker://img:latest'"));
    }

    #[test]
    fn upload_command_depends_on_compute_job() {
        let cmd = build_upload_command(&server(), "A", "/lustre/lake/A", 42);
        assert!(cmd.contains("--job-name upload_A"));
        assert!(cmd.contains("--partition transfer"));
        assert!(cmd.contains("--dependency afterok:42"));
        assert!(cmd.contains("uploader upload_results_A"));
        assert!(cmd.contains("touch RESULTS_UPLOADED"));
        assert!(cmd.contains("rm -rf '/lustre/lake/A'"));
    }

    #[test]
    fn mail_flags_appear_when_configured() {
        let mut server = server();
        server.mail = Some("ops@example.org".to_string());
        let cmd = build_compute_command(&server, &hpc(), "A", "/lustre/lake/A", None);
        assert!(cmd.contains("--mail-user ops@example.org --mail-type END,FAIL"));
    }

    #[test]
    fn parse_job_id_reads_sbatch_ack() {
        assert_eq!(parse_job_id("Submitted batch job 11"), Some(11));
        assert_eq!(parse_job_id("Submitted batch job 11\n"), Some(11));
        assert_eq!(parse_job_id("sbatch: error: invalid partition"), None);
        assert_eq!(parse_job_id(""), None);
    }
}
