// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Analysis runners. Both variants share one contract: given an input path
//! list and a working directory, produce an output path list inside it.

pub mod code;
pub mod container;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("user code does not define a callable 'main' entry point")]
    MissingEntryPoint,

    #[error("user code did not return a list of path-like values")]
    BadReturnType,

    #[error("analysis exited with code {code}")]
    AnalysisFailed { code: i32 },

    #[error("analysis io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Canonicalize runner output paths to absolute form. Relative paths are
/// resolved against the working directory; paths that cannot be resolved on
/// disk keep their syntactic absolute form.
pub fn canonicalize_outputs(work_dir: &Path, outputs: &[String]) -> Vec<PathBuf> {
    outputs
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            let path = PathBuf::from(raw.trim());
            let absolute = if path.is_absolute() {
                path
            } else {
                work_dir.join(path)
            };
            std::fs::canonicalize(&absolute).unwrap_or(absolute)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_outputs_resolve_against_work_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("out.txt"), b"x").unwrap();

        let outputs = canonicalize_outputs(
            dir.path(),
            &["out.txt".to_string(), "".to_string()],
        );

        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].is_absolute());
        assert!(outputs[0].ends_with("out.txt"));
    }

    #[test]
    fn missing_outputs_keep_syntactic_form() {
        let dir = TempDir::new().unwrap();
        let outputs = canonicalize_outputs(dir.path(), &["ghost.txt".to_string()]);
        assert_eq!(outputs, vec![dir.path().join("ghost.txt")]);
    }
}
