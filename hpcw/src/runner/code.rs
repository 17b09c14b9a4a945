// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Subprocess code runner.
//!
//! The user's code is persisted as `user_script.<ext>` and driven by a fixed
//! interpreter shim speaking a line protocol: input paths on stdin, output
//! paths on stdout. The shim exits 3 when `main` is missing and 4 when the
//! return value is not a sequence of path-like values, so contract
//! violations are distinguishable from ordinary analysis failures.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{canonicalize_outputs, RunnerError};

const DRIVER_FILE: &str = "entry_driver.py";
const EXIT_MISSING_ENTRY_POINT: i32 = 3;
const EXIT_BAD_RETURN_TYPE: i32 = 4;

const ENTRY_DRIVER: &str = r#"#!/usr/bin/env python3
import importlib.util
import os
import sys

EXIT_MISSING_ENTRY_POINT = 3
EXIT_BAD_RETURN_TYPE = 4


def load(path):
    spec = importlib.util.spec_from_file_location("user_script", path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
    return module


def run():
    module = load(sys.argv[1])
    entry = getattr(module, "main", None)
    if not callable(entry):
        sys.exit(EXIT_MISSING_ENTRY_POINT)
    files_in = [line.strip() for line in sys.stdin if line.strip()]
    result = entry(files_in)
    if isinstance(result, (str, bytes)) or not hasattr(result, "__iter__"):
        sys.exit(EXIT_BAD_RETURN_TYPE)
    try:
        files_out = [os.fspath(item) for item in result]
    except TypeError:
        sys.exit(EXIT_BAD_RETURN_TYPE)
    for item in files_out:
        print(item)


if __name__ == "__main__":
    run()
"#;

/// Persist the staged user code into the working directory under the
/// contract name `user_script.<ext>`, alongside the driver shim.
pub fn persist_user_script(
    staged_script: &Path,
    work_dir: &Path,
    ext: &str,
) -> Result<PathBuf, RunnerError> {
    let script_path = work_dir.join(format!("user_script.{ext}"));
    std::fs::copy(staged_script, &script_path)?;
    std::fs::write(work_dir.join(DRIVER_FILE), ENTRY_DRIVER)?;
    Ok(script_path)
}

/// Run the user's `main` over the input list, returning canonicalized output
/// paths.
pub async fn run(
    script_path: &Path,
    work_dir: &Path,
    inputs: &[String],
) -> Result<Vec<PathBuf>, RunnerError> {
    let mut child = Command::new("python3")
        .arg(work_dir.join(DRIVER_FILE))
        .arg(script_path)
        .current_dir(work_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        let mut feed = inputs.join("\n");
        feed.push('\n');
        stdin.write_all(feed.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    if !output.stderr.is_empty() {
        // surfaced verbatim so users can diagnose their own code
        tracing::warn!(
            stderr = %String::from_utf8_lossy(&output.stderr),
            "user code wrote to stderr"
        );
    }
    map_exit_code(output.status.code())?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<String> = stdout.lines().map(|line| line.to_string()).collect();
    Ok(canonicalize_outputs(work_dir, &lines))
}

fn map_exit_code(code: Option<i32>) -> Result<(), RunnerError> {
    match code {
        Some(0) => Ok(()),
        Some(EXIT_MISSING_ENTRY_POINT) => Err(RunnerError::MissingEntryPoint),
        Some(EXIT_BAD_RETURN_TYPE) => Err(RunnerError::BadReturnType),
        Some(code) => Err(RunnerError::AnalysisFailed { code }),
        None => Err(RunnerError::AnalysisFailed { code: -1 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn persists_script_and_driver() {
        let staged = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let source = staged.path().join("reduce.py");
        std::fs::write(&source, "def main(files_in):\n    return files_in\n").unwrap();

        let script = persist_user_script(&source, work.path(), "py").unwrap();

        assert_eq!(script, work.path().join("user_script.py"));
        assert!(work.path().join(DRIVER_FILE).is_file());
        let driver = std::fs::read_to_string(work.path().join(DRIVER_FILE)).unwrap();
        assert!(driver.contains("EXIT_MISSING_ENTRY_POINT = 3"));
        assert!(driver.contains("EXIT_BAD_RETURN_TYPE = 4"));
    }

    #[test]
    fn exit_codes_map_to_contract_errors() {
        assert!(map_exit_code(Some(0)).is_ok());
        assert!(matches!(
            map_exit_code(Some(3)),
            Err(RunnerError::MissingEntryPoint)
        ));
        assert!(matches!(
            map_exit_code(Some(4)),
            Err(RunnerError::BadReturnType)
        ));
        assert!(matches!(
            map_exit_code(Some(1)),
            Err(RunnerError::AnalysisFailed { code: 1 })
        ));
        assert!(matches!(
            map_exit_code(None),
            Err(RunnerError::AnalysisFailed { code: -1 })
        ));
    }

    #[test]
    fn driver_reads_stdin_and_prints_outputs() {
        // the shim's protocol markers, not its behaviour: stdin in, stdout out
        assert!(ENTRY_DRIVER.contains("sys.stdin"));
        assert!(ENTRY_DRIVER.contains("print(item)"));
        assert!(ENTRY_DRIVER.contains(r#"getattr(module, "main", None)"#));
    }
}
