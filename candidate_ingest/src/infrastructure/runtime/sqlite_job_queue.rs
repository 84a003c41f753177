// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Queue
//!
//! Durable FIFO queue over the `job_queue` table. Entries survive worker
//! restarts; delivery is at-least-once.
//!
//! ## Claiming
//!
//! A claim is one atomic `UPDATE ... RETURNING` that picks the oldest due
//! entry whose key has no live claimed entry, marks it running, and bumps
//! the attempt counter. That single statement is what enforces per-key
//! concurrency 1 even with several workers polling the same database.
//!
//! ## Leases and crash redelivery
//!
//! A claim carries a lease deadline. A worker that dies mid-job never acks,
//! and once its lease expires the entry becomes claimable again, which
//! redelivers the job; the orchestrator's persisted `rows_seen` turns that
//! redelivery into a resume with tolerated duplicates.
//!
//! ## Retry policy
//!
//! `nack` reschedules with exponential backoff starting at 2 s while
//! attempts remain, then parks the entry as dead with the error recorded.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use candidate_ingest_domain::repositories::job_queue::{
    JobQueue, QueueEntry, RETRY_INITIAL_BACKOFF_MS, RETRY_MAX_ATTEMPTS,
};
use candidate_ingest_domain::IngestError;

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// How long a claim stays exclusive without an ack or nack
    pub lease: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(RETRY_INITIAL_BACKOFF_MS),
            lease: Duration::from_secs(600),
        }
    }
}

/// Durable queue backed by SQLite.
pub struct SqliteJobQueue {
    pool: SqlitePool,
    config: QueueConfig,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, config: QueueConfig) -> Self {
        Self { pool, config }
    }

    fn backoff_for_attempts(&self, attempts: u32) -> Duration {
        // 2 s, 4 s, 8 s, ... for the default policy
        self.config.initial_backoff * 2u32.saturating_pow(attempts.saturating_sub(1))
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job_key: &str, payload: serde_json::Value) -> Result<(), IngestError> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO job_queue (job_key, payload, state, attempts, next_attempt_at, enqueued_at)
               VALUES (?, ?, 'pending', 0, ?, ?)"#,
        )
        .bind(job_key)
        .bind(payload.to_string())
        .bind(now.timestamp_millis())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::database_error(format!("Failed to enqueue: {}", e)))?;
        debug!(job_key, "enqueued");
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<QueueEntry>, IngestError> {
        let now_ms = Utc::now().timestamp_millis();
        let lease_deadline_ms = now_ms + self.config.lease.as_millis() as i64;

        let row = sqlx::query(
            r#"UPDATE job_queue
               SET state = 'running', attempts = attempts + 1, lease_expires_at = ?
               WHERE id = (
                   SELECT q.id FROM job_queue q
                   WHERE (
                           (q.state = 'pending' AND q.next_attempt_at <= ?)
                        OR (q.state = 'running' AND q.lease_expires_at <= ?)
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM job_queue r
                       WHERE r.job_key = q.job_key
                         AND r.id != q.id
                         AND r.state = 'running'
                         AND r.lease_expires_at > ?
                   )
                   ORDER BY q.id ASC
                   LIMIT 1
               )
               RETURNING id, job_key, payload, attempts, enqueued_at"#,
        )
        .bind(lease_deadline_ms)
        .bind(now_ms)
        .bind(now_ms)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IngestError::database_error(format!("Failed to claim: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload_text: String = row.get("payload");
        let enqueued_at: DateTime<Utc> = row.get("enqueued_at");
        let entry = QueueEntry {
            id: row.get::<i64, _>("id"),
            job_key: row.get("job_key"),
            payload: serde_json::from_str(&payload_text)?,
            attempts: row.get::<i64, _>("attempts") as u32,
            enqueued_at,
        };
        debug!(entry_id = entry.id, job_key = %entry.job_key, attempts = entry.attempts, "claimed");
        Ok(Some(entry))
    }

    async fn ack(&self, entry_id: i64) -> Result<(), IngestError> {
        let result = sqlx::query("DELETE FROM job_queue WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to ack: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(IngestError::not_found(format!(
                "Queue entry {} already settled",
                entry_id
            )));
        }
        Ok(())
    }

    async fn nack(&self, entry_id: i64, error: &str) -> Result<(), IngestError> {
        let row = sqlx::query("SELECT attempts FROM job_queue WHERE id = ? AND state = 'running'")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to read entry: {}", e)))?;

        let Some(row) = row else {
            return Err(IngestError::not_found(format!(
                "Queue entry {} is not claimed",
                entry_id
            )));
        };
        let attempts = row.get::<i64, _>("attempts") as u32;

        if attempts >= self.config.max_attempts {
            warn!(entry_id, attempts, error, "entry exhausted attempts, parking as dead");
            sqlx::query(
                "UPDATE job_queue SET state = 'dead', lease_expires_at = NULL, last_error = ? WHERE id = ?",
            )
            .bind(error)
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to park entry: {}", e)))?;
        } else {
            let due = Utc::now().timestamp_millis() + self.backoff_for_attempts(attempts).as_millis() as i64;
            debug!(entry_id, attempts, due_ms = due, "rescheduling with backoff");
            sqlx::query(
                r#"UPDATE job_queue
                   SET state = 'pending', lease_expires_at = NULL, next_attempt_at = ?, last_error = ?
                   WHERE id = ?"#,
            )
            .bind(due)
            .bind(error)
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to reschedule: {}", e)))?;
        }
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64, IngestError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM job_queue WHERE state = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to count: {}", e)))?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn dead_count(&self) -> Result<u64, IngestError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM job_queue WHERE state = 'dead'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IngestError::database_error(format!("Failed to count: {}", e)))?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema::in_memory_pool;
    use serde_json::json;

    async fn queue(config: QueueConfig) -> SqliteJobQueue {
        SqliteJobQueue::new(in_memory_pool().await.unwrap(), config)
    }

    fn fast_config() -> QueueConfig {
        QueueConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(40),
            lease: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_fifo_claim_order() {
        let queue = queue(fast_config()).await;
        queue.enqueue("job-a", json!({"n": 1})).await.unwrap();
        queue.enqueue("job-b", json!({"n": 2})).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(first.job_key, "job-a");
        let second = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(second.job_key, "job-b");
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_per_key_concurrency_is_one() {
        let queue = queue(fast_config()).await;
        queue.enqueue("job-a", json!({"n": 1})).await.unwrap();
        queue.enqueue("job-a", json!({"n": 2})).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        // Second entry for the same key must wait for the first to settle
        assert!(queue.claim_next().await.unwrap().is_none());

        queue.ack(first.id).await.unwrap();
        let second = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(second.payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_ack_removes_entry() {
        let queue = queue(fast_config()).await;
        queue.enqueue("job-a", json!({})).await.unwrap();
        let entry = queue.claim_next().await.unwrap().unwrap();
        queue.ack(entry.id).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert!(queue.ack(entry.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_nack_applies_backoff() {
        let queue = queue(fast_config()).await;
        queue.enqueue("job-a", json!({})).await.unwrap();

        let entry = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);
        queue.nack(entry.id, "transient").await.unwrap();

        // Not due yet
        assert!(queue.claim_next().await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let retried = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_park_as_dead() {
        let queue = queue(QueueConfig {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(10),
            lease: Duration::from_secs(60),
        })
        .await;
        queue.enqueue("job-a", json!({})).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        queue.nack(first.id, "boom 1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);
        queue.nack(second.id, "boom 2").await.unwrap();

        assert!(queue.claim_next().await.unwrap().is_none());
        assert_eq!(queue.dead_count().await.unwrap(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimable() {
        let queue = queue(QueueConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            lease: Duration::from_millis(30),
        })
        .await;
        queue.enqueue("job-a", json!({})).await.unwrap();

        let crashed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(crashed.attempts, 1);
        // Simulated worker crash: no ack, no nack

        tokio::time::sleep(Duration::from_millis(50)).await;
        let redelivered = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(redelivered.id, crashed.id);
        assert_eq!(redelivered.attempts, 2);
    }

    #[tokio::test]
    async fn test_durability_across_queue_instances() {
        let pool = in_memory_pool().await.unwrap();
        let first = SqliteJobQueue::new(pool.clone(), fast_config());
        first.enqueue("job-a", json!({"v": 7})).await.unwrap();
        drop(first);

        // A new queue over the same database sees the entry
        let second = SqliteJobQueue::new(pool, fast_config());
        let entry = second.claim_next().await.unwrap().unwrap();
        assert_eq!(entry.payload, json!({"v": 7}));
    }
}
