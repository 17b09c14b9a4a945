// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Object store client for result archives: custom endpoint, path-style
//! addressing, optional static credentials from the environment.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use std::path::Path;
use thiserror::Error;
use url::Url;

const ACCESS_KEY_ENV: &str = "BASIN_S3_ACCESS_KEY";
const SECRET_KEY_ENV: &str = "BASIN_S3_SECRET_KEY";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid object store endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        source: url::ParseError,
    },

    #[error("failed to read archive {0}")]
    ArchiveUnreadable(String),

    #[error("object store upload failed: {0}")]
    Upload(String),

    #[error("archive not visible in object store after upload: {0}")]
    NotVisible(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum S3Credentials {
    AccessKey {
        access_key: String,
        secret_key: String,
    },
    None,
}

impl S3Credentials {
    /// Static keys from the environment when both are set, otherwise none.
    pub fn from_env() -> Self {
        match (
            std::env::var(ACCESS_KEY_ENV),
            std::env::var(SECRET_KEY_ENV),
        ) {
            (Ok(access_key), Ok(secret_key)) => S3Credentials::AccessKey {
                access_key,
                secret_key,
            },
            _ => S3Credentials::None,
        }
    }
}

pub struct ResultStore {
    client: Client,
}

impl ResultStore {
    pub fn new(endpoint: &str, credentials: S3Credentials) -> Result<Self, UploadError> {
        let url = normalize_endpoint(endpoint)?;
        let builder = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        let builder = match credentials {
            S3Credentials::AccessKey {
                access_key,
                secret_key,
            } => builder.credentials_provider(Credentials::from_keys(
                access_key, secret_key, None,
            )),
            S3Credentials::None => builder,
        };
        let config = builder
            .region(Some(Region::new("us-east-1")))
            .endpoint_url(url.to_string())
            .force_path_style(true)
            .build();
        Ok(Self {
            client: Client::from_conf(config),
        })
    }

    /// Upload the archive under `key` and confirm it is visible afterwards.
    pub async fn upload_archive(
        &self,
        bucket: &str,
        key: &str,
        archive: &Path,
    ) -> Result<(), UploadError> {
        let body = ByteStream::from_path(archive)
            .await
            .map_err(|_| UploadError::ArchiveUnreadable(archive.display().to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| UploadError::Upload(err.to_string()))?;

        self.client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| UploadError::NotVisible(err.to_string()))?;

        Ok(())
    }
}

/// Endpoint values pass the config shape check but may omit the scheme;
/// default to https when they do.
fn normalize_endpoint(endpoint: &str) -> Result<Url, UploadError> {
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    Url::parse(&candidate).map_err(|source| UploadError::Endpoint {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gains_a_scheme_when_missing() {
        let url = normalize_endpoint("s3.example.org:9000").unwrap();
        assert_eq!(url.as_str(), "https://s3.example.org:9000/");

        let url = normalize_endpoint("http://minio.local/").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn credentials_fall_back_to_anonymous() {
        // neither env var is set in the test environment
        std::env::remove_var(ACCESS_KEY_ENV);
        std::env::remove_var(SECRET_KEY_ENV);
        assert!(S3Credentials::from_env() == S3Credentials::None);
    }

    #[tokio::test]
    async fn builds_clients_with_and_without_credentials() {
        ResultStore::new(
            "https://s3.example.org:9000",
            S3Credentials::AccessKey {
                access_key: "user".to_string(),
                secret_key: "password".to_string(),
            },
        )
        .unwrap();
        ResultStore::new("s3.example.org", S3Credentials::None).unwrap();
    }
}
