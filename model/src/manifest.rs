// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Declarative upload manifest.
//!
//! The HPC worker writes one of these next to the results directory; the
//! uploader consumes it on a later allocation. The manifest carries data
//! only — which directory to archive, where the archive goes, and which
//! bucket/key/endpoint receives it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadManifest {
    pub job_id: String,
    /// Directory whose contents become the archive.
    pub output_dir: PathBuf,
    /// Directory holding the batch scheduler's stdout/stderr files.
    pub logs_dir: PathBuf,
    /// Where the archive is written on the parallel filesystem.
    pub archive_path: PathBuf,
    pub s3_bucket: String,
    pub s3_key: String,
    pub s3_endpoint_url: String,
}

impl UploadManifest {
    pub fn read_from(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        // serialization of a plain struct cannot fail
        let raw = serde_json::to_string_pretty(self).unwrap_or_default();
        std::fs::write(path, raw).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
