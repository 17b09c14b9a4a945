// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Catalog access: authenticated session, `find(filter, projection)` yielding
//! lake paths, and the result-row insert performed by the packager.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection};
use serde_json::Value;
use thiserror::Error;

use model::config::HpcConfig;
use model::query::DocumentQuery;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog connection failed: {0}")]
    Unavailable(#[source] mongodb::error::Error),

    #[error("catalog operation failed: {0}")]
    Driver(#[from] mongodb::error::Error),
}

/// Result row registered once the archive's destination is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub job_id: String,
    pub s3_key: String,
    pub path: String,
    pub upload_date: String,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Paths of all entries matching the query, in the catalog's natural
    /// order. An empty result set is valid.
    async fn find_paths(&self, query: &DocumentQuery) -> Result<Vec<String>, CatalogError>;

    async fn insert_result(&self, record: &ResultRecord) -> Result<(), CatalogError>;
}

pub struct MongoCatalog {
    collection: Collection<Document>,
}

impl MongoCatalog {
    /// Open an authenticated session and fail fast when the catalog is
    /// unreachable or the credentials are rejected.
    pub async fn connect(cfg: &HpcConfig) -> Result<Self, CatalogError> {
        let uri = format!(
            "mongodb://{}:{}@{}:{}/",
            cfg.user, cfg.password, cfg.ip, cfg.port
        );
        let client = Client::with_uri_str(&uri)
            .await
            .map_err(CatalogError::Unavailable)?;
        let database = client.database(&cfg.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(CatalogError::Unavailable)?;
        Ok(Self {
            collection: database.collection::<Document>(&cfg.collection),
        })
    }
}

#[async_trait]
impl Catalog for MongoCatalog {
    async fn find_paths(&self, query: &DocumentQuery) -> Result<Vec<String>, CatalogError> {
        let filter = value_to_document(&query.filter);
        let projection = projection_document(query);

        let mut find = self.collection.find(filter);
        if let Some(projection) = projection {
            find = find.projection(projection);
        }
        let mut cursor = find.await?;

        let mut paths = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            match entry.get_str("path") {
                Ok(path) => paths.push(path.to_string()),
                Err(_) => {
                    tracing::warn!(?entry, "catalog entry without a path field, skipping");
                }
            }
        }
        Ok(paths)
    }

    async fn insert_result(&self, record: &ResultRecord) -> Result<(), CatalogError> {
        self.collection
            .insert_one(doc! {
                "job_id": &record.job_id,
                "s3_key": &record.s3_key,
                "path": &record.path,
                "upload_date": &record.upload_date,
            })
            .await?;
        Ok(())
    }
}

/// Projection document for a find. The identity field is excluded unless the
/// caller named it; an empty projection stays absent (catalog default).
fn projection_document(query: &DocumentQuery) -> Option<Document> {
    if query.projection.is_empty() {
        return None;
    }
    let mut projection = Document::new();
    for (field, include) in &query.projection {
        projection.insert(field.clone(), *include);
    }
    if !query.projection.contains_key("_id") {
        projection.insert("_id", 0);
    }
    Some(projection)
}

fn value_to_document(value: &Value) -> Document {
    match value_to_bson(value) {
        Bson::Document(document) => document,
        // filters are always objects; anything else selects nothing
        other => doc! { "$expr": other },
    }
}

fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(value_to_bson).collect()),
        Value::Object(map) => {
            let mut document = Document::new();
            for (key, item) in map {
                document.insert(key.clone(), value_to_bson(item));
            }
            Bson::Document(document)
        }
    }
}
