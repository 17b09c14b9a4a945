// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Local submission bookkeeping: one row per accepted request with the
//! scheduler ids of its batch chain. Backs the job-status contract of the
//! REST tier fronting this daemon.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use model::state::JobState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("submission not found for request '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub request_id: String,
    pub build_job_id: Option<i64>,
    pub compute_job_id: i64,
    pub upload_job_id: i64,
    pub state: JobState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub id: i64,
    pub request_id: String,
    pub build_job_id: Option<i64>,
    pub compute_job_id: i64,
    pub upload_job_id: i64,
    pub state: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn open_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL UNIQUE,
                build_job_id INTEGER,
                compute_job_id INTEGER NOT NULL,
                upload_job_id INTEGER NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert(&self, submission: &NewSubmission) -> Result<i64, StoreError> {
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let result = sqlx::query(
            r#"
            INSERT INTO submissions
                (request_id, build_job_id, compute_job_id, upload_job_id, state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&submission.request_id)
        .bind(submission.build_job_id)
        .bind(submission.compute_job_id)
        .bind(submission.upload_job_id)
        .bind(submission.state.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, request_id: &str) -> Result<SubmissionRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, request_id, build_job_id, compute_job_id, upload_job_id, state, created_at
            FROM submissions WHERE request_id = ?1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound(request_id.to_string()));
        };
        Ok(record_from_row(&row)?)
    }

    pub async fn list(&self) -> Result<Vec<SubmissionRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, build_job_id, compute_job_id, upload_job_id, state, created_at
            FROM submissions ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SubmissionRecord, sqlx::Error> {
    Ok(SubmissionRecord {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        build_job_id: row.try_get("build_job_id")?,
        compute_job_id: row.try_get("compute_job_id")?,
        upload_job_id: row.try_get("upload_job_id")?,
        state: row.try_get("state")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(request_id: &str) -> NewSubmission {
        NewSubmission {
            request_id: request_id.to_string(),
            build_job_id: None,
            compute_job_id: 42,
            upload_job_id: 43,
            state: JobState::UploadQueued,
        }
    }

    #[tokio::test]
    async fn inserts_and_fetches_submissions() {
        let store = SubmissionStore::open_memory().await.unwrap();
        store.insert(&submission("A")).await.unwrap();

        let record = store.get("A").await.unwrap();
        assert_eq!(record.request_id, "A");
        assert_eq!(record.compute_job_id, 42);
        assert_eq!(record.upload_job_id, 43);
        assert_eq!(record.build_job_id, None);
        assert_eq!(record.state, "UPLOAD_QUEUED");
        assert!(!record.created_at.is_empty());
    }

    #[tokio::test]
    async fn duplicate_request_ids_are_rejected() {
        let store = SubmissionStore::open_memory().await.unwrap();
        store.insert(&submission("A")).await.unwrap();
        let err = store.insert(&submission("A")).await.unwrap_err();
        assert!(matches!(err, StoreError::Sqlx(_)));
    }

    #[tokio::test]
    async fn missing_submission_is_not_found() {
        let store = SubmissionStore::open_memory().await.unwrap();
        let err = store.get("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_insertion_order() {
        let store = SubmissionStore::open_memory().await.unwrap();
        store.insert(&submission("A")).await.unwrap();
        let mut second = submission("B");
        second.build_job_id = Some(41);
        store.insert(&second).await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].request_id, "A");
        assert_eq!(records[1].request_id, "B");
        assert_eq!(records[1].build_job_id, Some(41));
    }
}
