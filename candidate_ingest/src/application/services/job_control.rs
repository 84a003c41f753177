// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Control
//!
//! The narrow contract the external HTTP layer calls: create a job from an
//! assembled upload, poll its status, pause, resume, and list a user's
//! history. Everything here is control-plane; the data plane lives in the
//! ingestion orchestrator behind the queue.
//!
//! ## Create
//!
//! Job creation re-runs header detection with the user's mapping values so
//! files with garbage preambles get the right header row, and persists the
//! detection result on the job; processing later replays exactly that
//! decision instead of re-detecting against a possibly changed heuristic.
//!
//! ## Pause / resume
//!
//! `pause` only sets a flag; the orchestrator honors it between batches,
//! so the shortest pause latency is one batch. `resume` re-opens the job
//! (from `Paused`, or from a terminal state for a re-run), preserves the
//! counters, and enqueues a run that skips the rows already seen. Issuing
//! many concurrent resumes enqueues many entries, but the queue's per-key
//! concurrency keeps at most one worker in `Processing`; stale entries
//! find the job terminal at pickup and are dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use candidate_ingest_domain::services::header_detector;
use candidate_ingest_domain::services::object_store::read_prefix;
use candidate_ingest_domain::{
    FieldMapping, IngestError, JobId, JobQueue, JobRepository, JobState, ObjectStore, StorageKey,
    UploadJob,
};

/// Queue payload of one processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub resume_from: u64,
    #[serde(default)]
    pub initial_inserted: u64,
    #[serde(default)]
    pub initial_rejected: u64,
}

/// Inputs for creating a job from an assembled upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub user_id: String,
    pub storage_key: String,
    pub original_name: String,
    pub mapping: FieldMapping,
    /// Headers the client captured at mapping time; when present these are
    /// stored verbatim so the mapping UI and processing agree
    #[serde(default)]
    pub headers: Vec<String>,
}

/// Read model of a job for status polling and history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub original_name: String,
    pub storage_key: String,
    pub state: JobState,
    pub rows_seen: u64,
    pub rows_inserted: u64,
    pub rows_rejected: u64,
    pub progress_percent: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&UploadJob> for JobStatusView {
    fn from(job: &UploadJob) -> Self {
        Self {
            job_id: job.id,
            original_name: job.original_name.clone(),
            storage_key: job.storage_key.to_string(),
            state: job.state,
            rows_seen: job.rows_seen,
            rows_inserted: job.rows_inserted,
            rows_rejected: job.rows_rejected,
            progress_percent: job.progress_percent(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error: job.error.clone(),
        }
    }
}

/// Control API over jobs: create, status, pause, resume, history.
pub struct JobControlService {
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
}

impl JobControlService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { jobs, queue, store }
    }

    /// Creates a job in `MappingPending` and enqueues its first run.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<JobId, IngestError> {
        let storage_key = StorageKey::parse(request.storage_key)?;
        if !self.store.exists(&storage_key).await? {
            return Err(IngestError::not_found(format!(
                "Source object not found: {}",
                storage_key
            )));
        }

        // Detection with the mapping values finds headers below preambles;
        // the result is frozen on the job for reproducible processing
        let prefix = read_prefix(
            self.store.as_ref(),
            &storage_key,
            header_detector::HEADER_SCAN_BYTES,
        )
        .await?;
        let expected = request.mapping.expected_headers();
        let detection = header_detector::detect(&prefix, &expected)?;
        if !detection.matched_expected_header {
            warn!(
                storage_key = %storage_key,
                "no mapping value matched any scanned line, assuming headers on line 0"
            );
        }

        let stored_headers = if request.headers.is_empty() {
            detection.headers.clone()
        } else {
            request.headers
        };

        let mut job = UploadJob::new(
            request.user_id,
            storage_key,
            request.original_name,
            request.mapping,
            stored_headers,
            detection.header_row_index,
            detection.delimiter,
        )?;
        job.source_size_bytes = self.store.size(&job.storage_key).await.ok();

        self.jobs.save(&job).await?;
        self.enqueue_run(
            &job,
            JobRunRequest {
                job_id: job.id,
                resume_from: 0,
                initial_inserted: 0,
                initial_rejected: 0,
            },
        )
        .await?;

        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            source = %job.storage_key,
            header_row = job.header_row_index,
            delimiter = %job.delimiter,
            "job created and enqueued"
        );
        Ok(job.id)
    }

    /// Current state, counters, and timestamps of a job.
    pub async fn status(&self, job_id: JobId) -> Result<JobStatusView, IngestError> {
        let job = self.load(job_id).await?;
        Ok(JobStatusView::from(&job))
    }

    /// Requests a cooperative pause. Idempotent; a no-op on terminal jobs.
    pub async fn pause(&self, job_id: JobId) -> Result<(), IngestError> {
        let mut job = self.load(job_id).await?;
        if job.is_terminal() {
            return Ok(());
        }
        job.request_pause();
        self.jobs.update(&job).await?;
        info!(job_id = %job.id, "pause requested");
        Ok(())
    }

    /// Re-opens a paused or terminal job and enqueues a run that continues
    /// from the rows already seen, counters preserved.
    pub async fn resume(&self, job_id: JobId) -> Result<(), IngestError> {
        let mut job = self.load(job_id).await?;
        job.prepare_resume()?;
        self.jobs.update(&job).await?;

        self.enqueue_run(
            &job,
            JobRunRequest {
                job_id: job.id,
                resume_from: job.rows_seen,
                initial_inserted: job.rows_inserted,
                initial_rejected: job.rows_rejected,
            },
        )
        .await?;
        info!(job_id = %job.id, resume_from = job.rows_seen, "job re-enqueued");
        Ok(())
    }

    /// A user's jobs, newest first.
    pub async fn list_history(&self, user_id: &str) -> Result<Vec<JobStatusView>, IngestError> {
        let jobs = self.jobs.list_by_user(user_id).await?;
        Ok(jobs.iter().map(JobStatusView::from).collect())
    }

    async fn load(&self, job_id: JobId) -> Result<UploadJob, IngestError> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| IngestError::not_found(format!("Job not found: {}", job_id)))
    }

    async fn enqueue_run(&self, job: &UploadJob, request: JobRunRequest) -> Result<(), IngestError> {
        let payload = serde_json::to_value(&request)?;
        self.queue.enqueue(&job.id.to_string(), payload).await
    }
}
