// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! SFTP staging operations: directory creation keyed by the request id and
//! whole-file uploads of the payload and the user artifact.

use anyhow::{anyhow, Context, Result};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags};
use std::path::Path;
use tokio::fs as tokiofs;
use tokio::io::AsyncWriteExt;

use super::session::SessionManager;

impl SessionManager {
    async fn sftp(&self) -> Result<SftpSession> {
        self.ensure_connected().await?;
        let guard = self.handle.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| anyhow!("SSH handle lost before opening SFTP"))?;
        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;
        Ok(sftp)
    }

    pub async fn dir_exists(&self, remote_dir: &str) -> Result<bool> {
        let sftp = self.sftp().await?;
        Ok(sftp.try_exists(remote_dir).await?)
    }

    /// Create the job directory. The parent (the parallel filesystem prefix)
    /// must already exist; requests never create anything above their own
    /// directory.
    pub async fn create_dir(&self, remote_dir: &str) -> Result<()> {
        let sftp = self.sftp().await?;
        sftp.create_dir(remote_dir)
            .await
            .with_context(|| format!("creating remote directory {remote_dir}"))?;
        let attrs = FileAttributes {
            permissions: Some(0o700),
            ..Default::default()
        };
        if let Err(err) = sftp.set_metadata(remote_dir, attrs).await {
            tracing::debug!("could not set permissions on {remote_dir}: {err}");
        }
        Ok(())
    }

    /// Write bytes to a remote file, creating or truncating it.
    pub async fn write_file(&self, remote_path: &str, content: &[u8]) -> Result<()> {
        let sftp = self.sftp().await?;
        let flags = OpenFlags::WRITE
            .union(OpenFlags::CREATE)
            .union(OpenFlags::TRUNCATE);
        let attrs = FileAttributes {
            permissions: Some(0o600),
            ..Default::default()
        };
        let mut file = sftp
            .open_with_flags_and_attributes(remote_path, flags, attrs)
            .await
            .with_context(|| format!("open remote file {remote_path}"))?;
        file.write_all(content)
            .await
            .with_context(|| format!("write remote file {remote_path}"))?;
        file.flush().await?;
        file.shutdown().await?;
        Ok(())
    }

    /// Upload one local file to a remote path, preserving nothing but bytes.
    pub async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let content = tokiofs::read(local_path)
            .await
            .with_context(|| format!("read local file {}", local_path.display()))?;
        self.write_file(remote_path, &content).await
    }
}
