// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Container runner: `srun singularity run|exec` with the lake prefix bound
//! read-only and the results directory bound read-write. Combined
//! stdout/stderr is captured to `output/logfile.log`; the output set is the
//! final contents of the results directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use model::config::HpcConfig;
use model::names;

use super::RunnerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Compose the container invocation. Everything here is either a validated
/// configuration value, a path under the job directory, or user text that
/// stays inside this argv (it never touches a shell).
pub fn build_invocation(
    cfg: &HpcConfig,
    image: &Path,
    exec_command: Option<&str>,
    inputs: &[String],
    output_dir: &Path,
) -> ContainerInvocation {
    let mut args = vec![
        "--ntasks".to_string(),
        cfg.mpi_np.clone(),
        "singularity".to_string(),
    ];
    match exec_command {
        Some(_) => args.push("exec".to_string()),
        None => args.push("run".to_string()),
    }
    args.push("--bind".to_string());
    args.push(format!(
        "{}:{}:ro",
        cfg.pfs_prefix_path, cfg.pfs_prefix_path
    ));
    args.push("--bind".to_string());
    args.push(format!(
        "{}:{}:rw",
        output_dir.display(),
        output_dir.display()
    ));
    args.push(image.display().to_string());
    if let Some(command) = exec_command {
        args.extend(split_command(command));
    }
    for input in inputs {
        let basename = Path::new(input)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.clone());
        args.push(basename);
    }

    ContainerInvocation {
        program: "srun".to_string(),
        args,
        env: vec![(
            "OMP_NUM_THREADS".to_string(),
            cfg.omp_num_threads.clone(),
        )],
    }
}

/// Run the container and return the final contents of the results directory.
pub async fn run(
    invocation: &ContainerInvocation,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, RunnerError> {
    std::fs::create_dir_all(output_dir)?;

    let output = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(invocation.env.iter().cloned())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    let log_path = output_dir.join(names::CONTAINER_LOG_FILE);
    let mut log = output.stdout.clone();
    log.extend_from_slice(&output.stderr);
    std::fs::write(&log_path, &log)?;

    if !output.status.success() {
        return Err(RunnerError::AnalysisFailed {
            code: output.status.code().unwrap_or(-1),
        });
    }

    collect_dir(output_dir)
}

fn collect_dir(dir: &Path) -> Result<Vec<PathBuf>, RunnerError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let path = entry.path();
            entries.push(std::fs::canonicalize(&path).unwrap_or(path));
        }
    }
    entries.sort();
    Ok(entries)
}

/// Split a user command into argv, honouring single/double quotes and
/// backslash escapes.
fn split_command(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            buf.push(ch);
            escape = false;
            continue;
        }
        if ch == '\\' {
            escape = true;
            continue;
        }
        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                buf.push(ch);
            }
            continue;
        }
        if in_double {
            if ch == '"' {
                in_double = false;
            } else {
                buf.push(ch);
            }
            continue;
        }
        match ch {
            '\'' => in_single = true,
            '"' => in_double = true,
            ch if ch.is_whitespace() => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            _ => buf.push(ch),
        }
    }

    if escape {
        buf.push('\\');
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HpcConfig {
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
            modules: "[]".to_string(),
        }
    }

    #[test]
    fn run_mode_without_exec_command() {
        let invocation = build_invocation(
            &config(),
            Path::new("/lustre/lake/A/image.sif"),
            None,
            &["/lustre/lake/test1.txt".to_string()],
            Path::new("/lustre/lake/A/output"),
        );
        assert_eq!(invocation.program, "srun");
        assert_eq!(
            invocation.args,
            vec![
                "--ntasks",
                "4",
                "singularity",
                "run",
                "--bind",
                "/lustre/lake:/lustre/lake:ro",
                "--bind",
                "/lustre/lake/A/output:/lustre/lake/A/output:rw",
                "/lustre/lake/A/image.sif",
                "test1.txt",
            ]
        );
        assert_eq!(
            invocation.env,
            vec![("OMP_NUM_THREADS".to_string(), "8".to_string())]
        );
    }

    #[test]
    fn exec_mode_carries_the_command() {
        let invocation = build_invocation(
            &config(),
            Path::new("/lustre/lake/A/container_A.sif"),
            Some("process --threshold '0.5'"),
            &[
                "/lustre/lake/test1.txt".to_string(),
                "/lustre/lake/test2.txt".to_string(),
            ],
            Path::new("/lustre/lake/A/output"),
        );
        let args = &invocation.args;
        assert_eq!(args[3], "exec");
        let tail: Vec<&str> = args[args.len() - 5..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec!["process", "--threshold", "0.5", "test1.txt", "test2.txt"]
        );
    }

    #[test]
    fn split_command_honours_quotes_and_escapes() {
        assert_eq!(
            split_command(r#"run "two words" 'single' esc\ aped"#),
            vec!["run", "two words", "single", "esc aped"]
        );
        assert_eq!(split_command("  "), Vec::<String>::new());
    }

    #[test]
    fn collect_dir_lists_files_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = collect_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
