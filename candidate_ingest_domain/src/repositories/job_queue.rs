// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Queue Interface
//!
//! Durable FIFO queue port with the delivery guarantees the pipeline
//! depends on:
//!
//! - **Durability**: entries survive worker restarts
//! - **Per-key concurrency 1**: at most one claimed entry per job key at a
//!   time, which is what enforces the at-most-one-worker-in-`Processing`
//!   invariant
//! - **Bounded retry**: a nacked entry is redelivered after exponential
//!   backoff (2 s initial) for up to 3 attempts, then parked as dead
//!
//! Claiming hands out a [`QueueEntry`] that the worker must settle with
//! `ack` (success, entry removed) or `nack` (failure, entry rescheduled or
//! parked). An unacked claim from a crashed worker becomes claimable again
//! once its lease expires, which is how crash redelivery works.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// Default initial retry backoff
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 2_000;

/// Default maximum delivery attempts
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// One claimed queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Queue-assigned identity used to ack or nack this delivery
    pub id: i64,
    /// Per-key concurrency key; the pipeline uses the job id
    pub job_key: String,
    pub payload: serde_json::Value,
    /// Delivery attempts so far, this one included
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Durable FIFO queue port.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends an entry for `job_key`
    async fn enqueue(&self, job_key: &str, payload: serde_json::Value) -> Result<(), IngestError>;

    /// Claims the oldest due entry whose key has no other claimed entry.
    ///
    /// Returns `None` when nothing is due.
    async fn claim_next(&self) -> Result<Option<QueueEntry>, IngestError>;

    /// Settles a delivery as succeeded; the entry is removed
    async fn ack(&self, entry_id: i64) -> Result<(), IngestError>;

    /// Settles a delivery as failed.
    ///
    /// Reschedules with exponential backoff while attempts remain,
    /// otherwise parks the entry as dead with the error recorded.
    async fn nack(&self, entry_id: i64, error: &str) -> Result<(), IngestError>;

    /// Entries waiting for delivery (due or backing off)
    async fn pending_count(&self) -> Result<u64, IngestError>;

    /// Entries parked after exhausting their attempts
    async fn dead_count(&self) -> Result<u64, IngestError>;
}
