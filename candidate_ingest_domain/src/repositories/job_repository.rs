// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Repository Interface
//!
//! Persistence port for upload jobs. Keeps the lifecycle and counter logic
//! in the `UploadJob` entity independent of the storage technology, and
//! lets tests run against an in-memory implementation.
//!
//! During `Processing` the orchestrator is the only writer of a job record;
//! `status` readers may read concurrently. That single-writer rule is a
//! state-machine invariant enforced by the queue's per-key concurrency,
//! not by this trait, so implementations do not need row locking.

use async_trait::async_trait;

use crate::entities::{JobState, UploadJob};
use crate::value_objects::JobId;
use crate::IngestError;

/// Repository interface for upload job persistence.
///
/// Implementations must be thread-safe (`Send + Sync`); all operations are
/// asynchronous to support non-blocking I/O.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persists a new job
    async fn save(&self, job: &UploadJob) -> Result<(), IngestError>;

    /// Finds a job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<UploadJob>, IngestError>;

    /// Rewrites an existing job record
    async fn update(&self, job: &UploadJob) -> Result<(), IngestError>;

    /// Lists a user's jobs, newest first
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UploadJob>, IngestError>;

    /// Lists jobs in a given lifecycle state
    async fn list_by_state(&self, state: JobState) -> Result<Vec<UploadJob>, IngestError>;

    /// Counts all jobs
    async fn count(&self) -> Result<usize, IngestError>;
}
