// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Filenames and sentinels derived from a request id. Every tier derives the
//! same names from the same id, so they live in one place.

pub const ARCHIVE_EXT: &str = "zip";
pub const OUTPUT_DIR: &str = "output";
pub const CONTAINER_LOG_FILE: &str = "logfile.log";
pub const JOB_DONE_SENTINEL: &str = "JOB_DONE";
pub const RESULTS_UPLOADED_SENTINEL: &str = "RESULTS_UPLOADED";
pub const SCHEDULER_LOG_PREFIX: &str = "slurm-";

pub fn archive_name(id: &str) -> String {
    format!("results_{id}.{ARCHIVE_EXT}")
}

pub fn manifest_name(id: &str) -> String {
    format!("upload_results_{id}")
}

pub fn query_file_name(id: &str) -> String {
    format!("query_{id}.txt")
}

pub fn user_script_name(id: &str, ext: &str) -> String {
    format!("user_script_{id}.{ext}")
}

pub fn container_image_name(id: &str) -> String {
    format!("container_{id}.sif")
}

pub fn payload_file_name(id: &str) -> String {
    format!("request_{id}.json")
}

/// Remote job directory for a request: the id directly under the parallel
/// filesystem prefix.
pub fn job_dir(pfs_prefix: &str, id: &str) -> String {
    format!("{}/{}", pfs_prefix.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_carry_the_request_id() {
        assert_eq!(archive_name("A"), "results_A.zip");
        assert_eq!(manifest_name("A"), "upload_results_A");
        assert_eq!(query_file_name("A"), "query_A.txt");
        assert_eq!(user_script_name("B", "py"), "user_script_B.py");
        assert_eq!(container_image_name("C"), "container_C.sif");
        assert_eq!(payload_file_name("A"), "request_A.json");
    }

    #[test]
    fn job_dir_joins_under_prefix() {
        assert_eq!(job_dir("/lustre/lake", "A"), "/lustre/lake/A");
        assert_eq!(job_dir("/lustre/lake/", "A"), "/lustre/lake/A");
    }
}
