// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Scheduler-log collection and deterministic archive creation.
//!
//! Entries are walked in sorted order and written with pinned timestamps, so
//! the same results directory always produces a byte-identical archive.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::{ExtendedFileOptions, FileOptions};
use zip::{CompressionMethod, ZipWriter};

use model::names;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to collect scheduler logs from {dir}: {source}")]
    Logs {
        dir: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk results directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive write error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Copy the batch scheduler's stdout/stderr files (`slurm-*`) from the job
/// directory into the results directory so they travel with the archive.
pub fn copy_scheduler_logs(logs_dir: &Path, output_dir: &Path) -> Result<usize, ArchiveError> {
    let entries = std::fs::read_dir(logs_dir).map_err(|source| ArchiveError::Logs {
        dir: logs_dir.to_path_buf(),
        source,
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry.map_err(|source| ArchiveError::Logs {
            dir: logs_dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(names::SCHEDULER_LOG_PREFIX) {
            continue;
        }
        std::fs::copy(entry.path(), output_dir.join(name.as_ref()))?;
        copied += 1;
    }
    Ok(copied)
}

/// Compress the results directory into a single archive at `archive_path`.
pub fn create_archive(output_dir: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
    let file = File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options: FileOptions<ExtendedFileOptions> = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut buffer = Vec::new();
    for entry in WalkDir::new(output_dir)
        .sort_by_file_name()
        .follow_links(false)
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(output_dir)
            .unwrap_or(entry.path());
        writer.start_file(relative.to_string_lossy(), options.clone())?;
        let mut source = File::open(entry.path())?;
        buffer.clear();
        source.read_to_end(&mut buffer)?;
        writer.write_all(&buffer)?;
    }
    writer.finish()?;
    Ok(())
}
