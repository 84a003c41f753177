// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Repository
//!
//! Persistent job store over the `upload_jobs` table. Scalar fields map to
//! columns so the user/state/created-at read paths hit indexes; mapping
//! and stored headers are JSON text frozen at mapping time.
//!
//! All queries are parameterized. The orchestrator is the only writer of a
//! record while its job is in `Processing`, so updates are plain rewrites
//! without row locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use candidate_ingest_domain::{
    Delimiter, FieldMapping, IngestError, JobId, JobRepository, JobState, StorageKey, UploadJob,
};

/// Job repository backed by SQLite.
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<UploadJob, IngestError> {
        let id: String = row.get("id");
        let mapping_json: String = row.get("mapping");
        let headers_json: String = row.get("stored_headers");
        let delimiter: String = row.get("delimiter");
        let state: String = row.get("state");
        let storage_key: String = row.get("storage_key");
        let rows_seen: i64 = row.get("rows_seen");
        let rows_inserted: i64 = row.get("rows_inserted");
        let rows_rejected: i64 = row.get("rows_rejected");
        let bytes_processed: i64 = row.get("bytes_processed");
        let source_size_bytes: Option<i64> = row.get("source_size_bytes");
        let header_row_index: i64 = row.get("header_row_index");
        let resume_from: Option<i64> = row.get("resume_from");
        let created_at: DateTime<Utc> = row.get("created_at");
        let started_at: Option<DateTime<Utc>> = row.get("started_at");
        let completed_at: Option<DateTime<Utc>> = row.get("completed_at");

        Ok(UploadJob {
            id: JobId::from_string(&id)?,
            user_id: row.get("user_id"),
            storage_key: StorageKey::parse(storage_key)?,
            original_name: row.get("original_name"),
            mapping: serde_json::from_str::<FieldMapping>(&mapping_json)?,
            stored_headers: serde_json::from_str::<Vec<String>>(&headers_json)?,
            header_row_index: header_row_index as u64,
            delimiter: Delimiter::from_str_value(&delimiter)?,
            state: JobState::from_str_value(&state)?,
            rows_seen: rows_seen as u64,
            rows_inserted: rows_inserted as u64,
            rows_rejected: rows_rejected as u64,
            bytes_processed: bytes_processed as u64,
            source_size_bytes: source_size_bytes.map(|v| v as u64),
            created_at,
            started_at,
            completed_at,
            error: row.get("error"),
            resume_from: resume_from.map(|v| v as u64),
            pause_requested: row.get::<i64, _>("pause_requested") != 0,
        })
    }

    fn bind_job_fields<'q>(
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        job: &'q UploadJob,
        mapping_json: &'q str,
        headers_json: &'q str,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query
            .bind(job.user_id.as_str())
            .bind(job.storage_key.as_str())
            .bind(job.original_name.as_str())
            .bind(mapping_json)
            .bind(headers_json)
            .bind(job.header_row_index as i64)
            .bind(job.delimiter.as_str())
            .bind(job.state.as_str())
            .bind(job.rows_seen as i64)
            .bind(job.rows_inserted as i64)
            .bind(job.rows_rejected as i64)
            .bind(job.bytes_processed as i64)
            .bind(job.source_size_bytes.map(|v| v as i64))
            .bind(job.created_at)
            .bind(job.started_at)
            .bind(job.completed_at)
            .bind(job.error.as_deref())
            .bind(job.resume_from.map(|v| v as i64))
            .bind(job.pause_requested as i64)
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn save(&self, job: &UploadJob) -> Result<(), IngestError> {
        let mapping_json = serde_json::to_string(&job.mapping)?;
        let headers_json = serde_json::to_string(&job.stored_headers)?;
        let id = job.id.to_string();

        let query = sqlx::query(
            r#"INSERT OR REPLACE INTO upload_jobs
               (id, user_id, storage_key, original_name, mapping, stored_headers,
                header_row_index, delimiter, state, rows_seen, rows_inserted,
                rows_rejected, bytes_processed, source_size_bytes, created_at,
                started_at, completed_at, error, resume_from, pause_requested)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id);
        Self::bind_job_fields(query, job, &mapping_json, &headers_json)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to save job: {}", e)))?;
        Ok(())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<UploadJob>, IngestError> {
        let row = sqlx::query("SELECT * FROM upload_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to query job: {}", e)))?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn update(&self, job: &UploadJob) -> Result<(), IngestError> {
        let mapping_json = serde_json::to_string(&job.mapping)?;
        let headers_json = serde_json::to_string(&job.stored_headers)?;
        let id = job.id.to_string();

        let query = sqlx::query(
            r#"UPDATE upload_jobs SET
               user_id = ?, storage_key = ?, original_name = ?, mapping = ?,
               stored_headers = ?, header_row_index = ?, delimiter = ?, state = ?,
               rows_seen = ?, rows_inserted = ?, rows_rejected = ?,
               bytes_processed = ?, source_size_bytes = ?, created_at = ?,
               started_at = ?, completed_at = ?, error = ?, resume_from = ?,
               pause_requested = ?
               WHERE id = ?"#,
        );
        let result = Self::bind_job_fields(query, job, &mapping_json, &headers_json)
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to update job: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(IngestError::not_found(format!("Job not found: {}", job.id)));
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UploadJob>, IngestError> {
        let rows =
            sqlx::query("SELECT * FROM upload_jobs WHERE user_id = ? ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    IngestError::database_error(format!("Failed to list jobs: {}", e))
                })?;
        rows.iter().map(Self::row_to_job).collect()
    }

    async fn list_by_state(&self, state: JobState) -> Result<Vec<UploadJob>, IngestError> {
        let rows =
            sqlx::query("SELECT * FROM upload_jobs WHERE state = ? ORDER BY created_at DESC")
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    IngestError::database_error(format!("Failed to list jobs by state: {}", e))
                })?;
        rows.iter().map(Self::row_to_job).collect()
    }

    async fn count(&self) -> Result<usize, IngestError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM upload_jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to count jobs: {}", e)))?;
        Ok(row.get::<i64, _>("n") as usize)
    }
}
