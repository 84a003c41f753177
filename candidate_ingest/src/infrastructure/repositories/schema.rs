// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Schema
//!
//! Idempotent schema bootstrap for the three SQLite tables the pipeline
//! owns: upload jobs, candidates, and the durable queue. Runs at startup;
//! every statement is `IF NOT EXISTS` so repeated boots are safe.
//!
//! Index choices follow the read paths: job history is listed per user
//! newest first, the worker scans jobs by state, and the queue claims by
//! due time within state.

use sqlx::SqlitePool;

use candidate_ingest_domain::IngestError;

/// Job records; scalar fields as columns so the query paths can be
/// indexed, mapping and headers as JSON text captured at mapping time.
const CREATE_UPLOAD_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS upload_jobs (
    id                TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    storage_key       TEXT NOT NULL,
    original_name     TEXT NOT NULL,
    mapping           TEXT NOT NULL,
    stored_headers    TEXT NOT NULL,
    header_row_index  INTEGER NOT NULL,
    delimiter         TEXT NOT NULL,
    state             TEXT NOT NULL,
    rows_seen         INTEGER NOT NULL DEFAULT 0,
    rows_inserted     INTEGER NOT NULL DEFAULT 0,
    rows_rejected     INTEGER NOT NULL DEFAULT 0,
    bytes_processed   INTEGER NOT NULL DEFAULT 0,
    source_size_bytes INTEGER,
    created_at        TEXT NOT NULL,
    started_at        TEXT,
    completed_at      TEXT,
    error             TEXT,
    resume_from       INTEGER,
    pause_requested   INTEGER NOT NULL DEFAULT 0
)
"#;

const CREATE_CANDIDATES: &str = r#"
CREATE TABLE IF NOT EXISTS candidates (
    rowid_pk      INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name     TEXT NOT NULL DEFAULT '',
    email         TEXT NOT NULL DEFAULT '',
    phone         TEXT NOT NULL DEFAULT '',
    company       TEXT NOT NULL DEFAULT '',
    industry      TEXT NOT NULL DEFAULT '',
    job_title     TEXT NOT NULL DEFAULT '',
    skills        TEXT NOT NULL DEFAULT '',
    experience    TEXT NOT NULL DEFAULT '',
    country       TEXT NOT NULL DEFAULT '',
    locality      TEXT NOT NULL DEFAULT '',
    location      TEXT NOT NULL DEFAULT '',
    linkedin_url  TEXT NOT NULL DEFAULT '',
    github_url    TEXT NOT NULL DEFAULT '',
    birth_year    TEXT NOT NULL DEFAULT '',
    summary       TEXT NOT NULL DEFAULT '',
    source_file   TEXT NOT NULL DEFAULT '',
    upload_job_id TEXT,
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT
)
"#;

/// Queue entries. Due/lease times are epoch milliseconds so claim
/// comparisons and backoff arithmetic stay integer.
const CREATE_JOB_QUEUE: &str = r#"
CREATE TABLE IF NOT EXISTS job_queue (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    job_key          TEXT NOT NULL,
    payload          TEXT NOT NULL,
    state            TEXT NOT NULL DEFAULT 'pending',
    attempts         INTEGER NOT NULL DEFAULT 0,
    next_attempt_at  INTEGER NOT NULL,
    lease_expires_at INTEGER,
    last_error       TEXT,
    enqueued_at      TEXT NOT NULL
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_upload_jobs_user ON upload_jobs (user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_upload_jobs_state ON upload_jobs (state)",
    "CREATE INDEX IF NOT EXISTS idx_upload_jobs_created ON upload_jobs (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_candidates_job ON candidates (upload_job_id)",
    "CREATE INDEX IF NOT EXISTS idx_candidates_email ON candidates (email)",
    "CREATE INDEX IF NOT EXISTS idx_job_queue_due ON job_queue (state, next_attempt_at)",
    "CREATE INDEX IF NOT EXISTS idx_job_queue_key ON job_queue (job_key)",
];

/// Creates tables and indexes that do not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), IngestError> {
    for statement in [CREATE_UPLOAD_JOBS, CREATE_CANDIDATES, CREATE_JOB_QUEUE] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to create table: {}", e)))?;
    }
    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to create index: {}", e)))?;
    }
    Ok(())
}

/// Connects an in-memory database with the schema applied; test helper.
///
/// Pinned to one connection: every pooled connection to `sqlite::memory:`
/// would otherwise see its own empty database.
pub async fn in_memory_pool() -> Result<SqlitePool, IngestError> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| IngestError::database_error(format!("Failed to open in-memory db: {}", e)))?;
    ensure_schema(&pool).await?;
    Ok(pool)
}
