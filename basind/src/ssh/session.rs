// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Long-lived SSH session to the HPC login node.
//!
//! The control node authenticates with a configured key and serializes
//! command use over a single connection; there is no interactive client to
//! relay prompts to, so keyboard-interactive auth is a hard failure.

use anyhow::{anyhow, Context, Result};
use russh::client::{AuthResult, Config};
use russh::keys::PrivateKeyWithHashAlg;
use russh::ChannelMsg;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Minimal russh client handler. We rely on default implementations.
/// TODO: add actual server key verification
#[derive(Clone, Debug, Default)]
pub(super) struct ClientHandler;

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub identity_path: PathBuf,
    pub keepalive_secs: u64,
}

/// Owns a single SSH connection; commands and SFTP channels are serialized
/// through the handle mutex.
pub struct SessionManager {
    params: SshParams,
    config: Arc<Config>,
    pub(super) handle: Arc<Mutex<Option<russh::client::Handle<ClientHandler>>>>,
}

impl SessionManager {
    pub fn new(params: SshParams) -> Self {
        let cfg = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            keepalive_interval: Some(Duration::from_secs(params.keepalive_secs)),
            ..Default::default()
        };
        Self {
            params,
            config: Arc::new(cfg),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Establish the connection and authenticate with the configured key.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut handle_field = self.handle.lock().await;
        let needs_connect = match handle_field.as_ref() {
            None => true,
            Some(h) if h.is_closed() => true,
            Some(_) => false,
        };
        if !needs_connect {
            return Ok(());
        }

        tracing::info!(
            "connecting to {}@{}:{}",
            self.params.username,
            self.params.host,
            self.params.port
        );
        let addr = (self.params.host.as_str(), self.params.port);
        let mut handle = russh::client::connect(self.config.clone(), addr, ClientHandler)
            .await
            .context("SSH connect failed")?;

        let key = russh::keys::load_secret_key(&self.params.identity_path, None)
            .with_context(|| {
                format!(
                    "failed to load secret key at {}",
                    self.params.identity_path.display()
                )
            })?;
        let key = PrivateKeyWithHashAlg::new(
            Arc::new(key),
            handle.best_supported_rsa_hash().await?.flatten(),
        );
        let result = handle
            .authenticate_publickey(self.params.username.clone(), key)
            .await?;
        match result {
            AuthResult::Success => {}
            AuthResult::Failure { .. } => {
                return Err(anyhow!(
                    "publickey authentication rejected for {}@{}",
                    self.params.username,
                    self.params.host
                ));
            }
        }

        *handle_field = Some(handle);
        Ok(())
    }

    /// Execute a command over SSH, returning stdout, stderr and exit code.
    pub async fn exec_capture(&self, cmd: &str) -> Result<(Vec<u8>, Vec<u8>, i32)> {
        self.ensure_connected().await?;
        let guard = self.handle.lock().await;
        let handle = guard.as_ref().ok_or_else(|| anyhow!("SSH handle lost"))?;
        let mut chan = handle.channel_open_session().await?;
        tracing::debug!("executing '{}'", cmd);
        chan.exec(true, cmd).await.context("exec request")?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code: i32 = 0;
        loop {
            let Some(msg) = chan.wait().await else {
                break;
            };
            if apply_channel_msg(&msg, &mut out, &mut err, &mut code) {
                break;
            }
        }
        let _ = chan.eof().await;
        let _ = chan.close().await;
        Ok((out, err, code))
    }

    pub async fn shutdown(&self) {
        let mut handle_field = self.handle.lock().await;
        let _ = handle_field.take();
    }
}

/// Fold one channel message into the captured output; true means the channel
/// closed.
fn apply_channel_msg(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut i32,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = *exit_status as i32;
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::CryptoVec;

    #[test]
    fn apply_channel_msg_accumulates_output() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code = 0;

        let msg = ChannelMsg::Data {
            data: CryptoVec::from_slice(b"submitted"),
        };
        assert!(!apply_channel_msg(&msg, &mut out, &mut err, &mut code));
        assert_eq!(out, b"submitted");

        let msg = ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"warning"),
            ext: 1,
        };
        assert!(!apply_channel_msg(&msg, &mut out, &mut err, &mut code));
        assert_eq!(err, b"warning");

        let msg = ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"ignored"),
            ext: 2,
        };
        assert!(!apply_channel_msg(&msg, &mut out, &mut err, &mut code));
        assert_eq!(err, b"warning");

        let msg = ChannelMsg::ExitStatus { exit_status: 7 };
        assert!(!apply_channel_msg(&msg, &mut out, &mut err, &mut code));
        assert_eq!(code, 7);

        assert!(apply_channel_msg(&ChannelMsg::Close, &mut out, &mut err, &mut code));
    }

    #[test]
    fn session_manager_starts_disconnected() {
        let manager = SessionManager::new(SshParams {
            host: "login.hpc.example.org".to_string(),
            port: 22,
            username: "submitter".to_string(),
            identity_path: PathBuf::from("/tmp/id_ed25519"),
            keepalive_secs: 60,
        });
        assert!(manager.handle.try_lock().unwrap().is_none());
    }
}
