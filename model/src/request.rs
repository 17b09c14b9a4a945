// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! The job request payload: accepted from the REST tier on the control node
//! and read back verbatim by the HPC worker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::validate;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request id '{0}' is not a valid identifier")]
    BadId(String),

    #[error("request specifies more than one analysis mode")]
    ConflictingModes,

    #[error("request has an empty sql_query")]
    EmptyQuery,

    #[error("exec_command given without a container analysis")]
    ExecWithoutContainer,

    #[error("container url '{0}' is not an accepted image reference")]
    BadContainerUrl(String),
}

/// Immutable job request. Exactly one analysis mode may be present; none at
/// all means pass-through (the matched paths are the result set).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    pub id: String,
    pub sql_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hpc: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_server: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// No user analysis: matched paths become the result set.
    PassThrough,
    /// Local code file whose `main` maps an input path list to outputs.
    Script { path: String },
    /// Container image file staged from the caller's machine.
    ContainerImage { path: String },
    /// Remote image reference built into a .sif on the cluster.
    ContainerUrl { url: String },
}

impl JobRequest {
    pub fn from_json(raw: &str) -> Result<Self, RequestError> {
        let request: JobRequest = serde_json::from_str(raw)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if !validate::is_request_id(&self.id) {
            return Err(RequestError::BadId(self.id.clone()));
        }
        if self.sql_query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        let modes = [
            self.script_path.is_some(),
            self.container_path.is_some(),
            self.container_url.is_some(),
        ];
        if modes.iter().filter(|present| **present).count() > 1 {
            return Err(RequestError::ConflictingModes);
        }
        if self.exec_command.is_some()
            && self.container_path.is_none()
            && self.container_url.is_none()
        {
            return Err(RequestError::ExecWithoutContainer);
        }
        if let Some(url) = &self.container_url {
            if !validate::is_container_url(url) {
                return Err(RequestError::BadContainerUrl(url.clone()));
            }
        }
        Ok(())
    }

    pub fn analysis(&self) -> Analysis {
        if let Some(path) = &self.script_path {
            Analysis::Script { path: path.clone() }
        } else if let Some(path) = &self.container_path {
            Analysis::ContainerImage { path: path.clone() }
        } else if let Some(url) = &self.container_url {
            Analysis::ContainerUrl { url: url.clone() }
        } else {
            Analysis::PassThrough
        }
    }

    /// Extension of the user script, defaulting to `py`.
    pub fn script_ext(&self) -> String {
        self.script_path
            .as_deref()
            .and_then(|path| Path::new(path).extension())
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "py".to_string())
    }
}
