// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Configuration profiles for the control node (`[server]`) and the HPC
//! worker (`[hpc]`).
//!
//! Both profiles are flat string maps with a fixed key set. Unknown keys are
//! rejected at parse time and every value must pass its key's shape check —
//! on load and again after request-supplied overrides are applied.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validate;

const APP_DIR_NAME: &str = "basin";
const CONFIG_FILE_NAME: &str = "basin.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for config key '{key}': '{value}'")]
    BadValue { key: String, value: String },

    #[error("unrecognized config key '{0}' in overrides")]
    UnknownKey(String),

    #[error("config file has no [{0}] profile")]
    MissingProfile(&'static str),
}

/// Profile used by the HPC worker: catalog connection, object store target
/// and the execution environment on the compute allocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HpcConfig {
    pub user: String,
    pub password: String,
    pub ip: String,
    pub port: String,
    pub database: String,
    pub collection: String,
    pub s3_bucket: String,
    pub s3_endpoint_url: String,
    pub pfs_prefix_path: String,
    pub omp_num_threads: String,
    pub mpi_np: String,
    pub modules: String,
}

/// Profile used by the control node: login host, submission identity and the
/// batch parameters interpolated into sbatch command lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub user: String,
    pub host: String,
    pub compute_partition: String,
    pub upload_partition: String,
    pub account: String,
    #[serde(default)]
    pub qos: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
    pub venv_path: String,
    pub ssh_key: String,
    #[serde(default)]
    pub mail: Option<String>,
    pub walltime: String,
    pub nodes: String,
    pub tasks_per_node: String,
    pub cpus_per_task: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub hpc: Option<HpcConfig>,
}

fn check(key: &str, value: &str, ok: bool) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl HpcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("user", &self.user, validate::is_word(&self.user))?;
        check("password", &self.password, validate::is_word(&self.password))?;
        check("ip", &self.ip, validate::is_dotted_host(&self.ip))?;
        check("port", &self.port, validate::is_number(&self.port))?;
        check("database", &self.database, validate::is_word(&self.database))?;
        check(
            "collection",
            &self.collection,
            validate::is_word(&self.collection),
        )?;
        check(
            "s3_bucket",
            &self.s3_bucket,
            validate::is_bucket_word(&self.s3_bucket),
        )?;
        check(
            "s3_endpoint_url",
            &self.s3_endpoint_url,
            validate::is_endpoint_url(&self.s3_endpoint_url),
        )?;
        check(
            "pfs_prefix_path",
            &self.pfs_prefix_path,
            validate::is_abs_path(&self.pfs_prefix_path),
        )?;
        check(
            "omp_num_threads",
            &self.omp_num_threads,
            validate::is_number(&self.omp_num_threads),
        )?;
        check("mpi_np", &self.mpi_np, validate::is_number(&self.mpi_np))?;
        check(
            "modules",
            &self.modules,
            validate::parse_module_list(&self.modules).is_some(),
        )?;
        Ok(())
    }

    /// Apply request-supplied overrides and re-run validation.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            match key.as_str() {
                "user" => self.user = value.clone(),
                "password" => self.password = value.clone(),
                "ip" => self.ip = value.clone(),
                "port" => self.port = value.clone(),
                "database" => self.database = value.clone(),
                "collection" => self.collection = value.clone(),
                "s3_bucket" => self.s3_bucket = value.clone(),
                "s3_endpoint_url" => self.s3_endpoint_url = value.clone(),
                "pfs_prefix_path" => self.pfs_prefix_path = value.clone(),
                "omp_num_threads" => self.omp_num_threads = value.clone(),
                "mpi_np" => self.mpi_np = value.clone(),
                "modules" => self.modules = value.clone(),
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        self.validate()
    }

    pub fn module_list(&self) -> Vec<String> {
        // validate() guarantees the list parses
        validate::parse_module_list(&self.modules).unwrap_or_default()
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("user", &self.user, validate::is_word(&self.user))?;
        check("host", &self.host, validate::is_dotted_host(&self.host))?;
        check(
            "compute_partition",
            &self.compute_partition,
            validate::is_word(&self.compute_partition),
        )?;
        check(
            "upload_partition",
            &self.upload_partition,
            validate::is_word(&self.upload_partition),
        )?;
        check("account", &self.account, validate::is_word(&self.account))?;
        if let Some(qos) = &self.qos {
            check("qos", qos, validate::is_word(qos))?;
        }
        if let Some(debug) = &self.debug {
            check("debug", debug, validate::is_word(debug))?;
        }
        check(
            "venv_path",
            &self.venv_path,
            validate::is_home_path(&self.venv_path),
        )?;
        check("ssh_key", &self.ssh_key, validate::is_home_path(&self.ssh_key))?;
        if let Some(mail) = &self.mail {
            check("mail", mail, validate::is_email(mail))?;
        }
        check(
            "walltime",
            &self.walltime,
            validate::is_walltime(&self.walltime),
        )?;
        check("nodes", &self.nodes, validate::is_node_count(&self.nodes))?;
        check(
            "tasks_per_node",
            &self.tasks_per_node,
            validate::is_number(&self.tasks_per_node),
        )?;
        check(
            "cpus_per_task",
            &self.cpus_per_task,
            validate::is_number(&self.cpus_per_task),
        )?;
        Ok(())
    }

    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            match key.as_str() {
                "user" => self.user = value.clone(),
                "host" => self.host = value.clone(),
                "compute_partition" => self.compute_partition = value.clone(),
                "upload_partition" => self.upload_partition = value.clone(),
                "account" => self.account = value.clone(),
                "qos" => self.qos = Some(value.clone()),
                "debug" => self.debug = Some(value.clone()),
                "venv_path" => self.venv_path = value.clone(),
                "ssh_key" => self.ssh_key = value.clone(),
                "mail" => self.mail = Some(value.clone()),
                "walltime" => self.walltime = value.clone(),
                "nodes" => self.nodes = value.clone(),
                "tasks_per_node" => self.tasks_per_node = value.clone(),
                "cpus_per_task" => self.cpus_per_task = value.clone(),
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        self.validate()
    }

    /// ssh_key with a leading `~/` expanded.
    pub fn ssh_key_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.ssh_key).as_ref())
    }
}

impl Settings {
    /// Load and validate settings. An explicitly named file must exist; the
    /// default location may be absent, yielding empty settings.
    pub fn load(config_path_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let required = config_path_override.is_some();
        let path = match config_path_override {
            Some(path) => expand_path(path),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Settings::default()),
            },
        };
        let settings = read_settings_file(&path, required)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.server {
            server.validate()?;
        }
        if let Some(hpc) = &self.hpc {
            hpc.validate()?;
        }
        Ok(())
    }

    pub fn require_server(self) -> Result<ServerConfig, ConfigError> {
        self.server.ok_or(ConfigError::MissingProfile("server"))
    }

    pub fn require_hpc(self) -> Result<HpcConfig, ConfigError> {
        self.hpc.ok_or(ConfigError::MissingProfile("hpc"))
    }
}

fn read_settings_file(path: &Path, required: bool) -> Result<Settings, ConfigError> {
    if !path.exists() {
        if required {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_path(path: PathBuf) -> PathBuf {
    let raw = path.to_string_lossy().to_string();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
