// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Candidate Store
//!
//! Destination datastore adapter with the unordered batch-insert contract:
//! every record of a batch is attempted inside one transaction, a
//! per-record problem never fails the call (`INSERT OR IGNORE`), and the
//! caller learns only whether the batch as a whole was attempted. The
//! table carries no uniqueness constraints; duplicate rows from retries
//! are tolerated by design and deduplication is a query-side concern.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use candidate_ingest_domain::{Candidate, CandidateStore, IngestError, InsertOptions};

/// Candidate datastore backed by SQLite.
pub struct SqliteCandidateStore {
    pool: SqlitePool,
}

impl SqliteCandidateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateStore for SqliteCandidateStore {
    async fn insert_many(
        &self,
        records: &[Candidate],
        options: InsertOptions,
    ) -> Result<(), IngestError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to open batch: {}", e)))?;

        let statement = if options.ordered {
            "INSERT INTO candidates"
        } else {
            "INSERT OR IGNORE INTO candidates"
        };

        for record in records {
            let query = format!(
                r#"{statement}
                   (full_name, email, phone, company, industry, job_title, skills,
                    experience, country, locality, location, linkedin_url,
                    github_url, birth_year, summary, source_file, upload_job_id,
                    is_deleted, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
            );
            sqlx::query(&query)
                .bind(&record.full_name)
                .bind(&record.email)
                .bind(&record.phone)
                .bind(&record.company)
                .bind(&record.industry)
                .bind(&record.job_title)
                .bind(&record.skills)
                .bind(&record.experience)
                .bind(&record.country)
                .bind(&record.locality)
                .bind(&record.location)
                .bind(&record.linkedin_url)
                .bind(&record.github_url)
                .bind(&record.birth_year)
                .bind(&record.summary)
                .bind(&record.source_file)
                .bind(record.upload_job_id.map(|id| id.to_string()))
                .bind(record.is_deleted as i64)
                .bind(record.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    IngestError::database_error(format!("Batch insert failed: {}", e))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to commit batch: {}", e)))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, IngestError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM candidates")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                IngestError::database_error(format!("Failed to count candidates: {}", e))
            })?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}
