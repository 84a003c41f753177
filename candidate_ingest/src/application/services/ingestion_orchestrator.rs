// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Orchestrator
//!
//! The job body: streams the assembled source object through the row
//! parser, applies mapping, cleaning, and validation, and writes accepted
//! records to the datastore in backpressured batches while keeping the job
//! record's counters and lifecycle current.
//!
//! ## Pipeline shape
//!
//! One cooperative pull-push chain, no parallel row processing:
//!
//! ```text
//! ObjectStore.get_range ──bytes──> RowParser ──records──> map + clean
//!       ▲                                                     │
//!       │                                 batch of BATCH_SIZE │
//!       └───── no read while insert in flight ◄── insert_many ┘
//! ```
//!
//! The next source chunk is not read while a batch insert is in flight,
//! which bounds memory to one batch plus one input chunk regardless of
//! file size.
//!
//! ## Error policy
//!
//! - a per-row problem (arity mismatch, failed validation) increments
//!   `rows_rejected` and never stops the stream
//! - a per-batch insert failure or timeout counts the whole batch as
//!   rejected and the stream continues
//! - anything that invalidates the rest of the stream (source missing,
//!   stored headers absent, wedged parser) marks the job `Failed` with its
//!   partial counters preserved and propagates
//!
//! ## Pause and resume
//!
//! Between batches the orchestrator reloads the job record, which both
//! persists progress and picks up a `pause_requested` flag set by the
//! control API; a process shutdown token is checked at the same gate. A
//! pause persists `resume_from = rows_seen` and exits cleanly. On resume
//! the parser skips `header_row_index + 1 + resume_from` record
//! boundaries, so rows between the last batch boundary and the pause point
//! may be re-inserted; duplicates are tolerated by the datastore contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use candidate_ingest_bootstrap::CancellationToken;
use candidate_ingest_domain::{
    Candidate, CandidateField, CandidateStore, CleanOutcome, CleanerConfig, IngestError,
    InsertOptions, JobId, JobRepository, JobState, ObjectStore, ParserOptions, RowCleaner,
    RowParser, UploadJob,
};

use crate::infrastructure::metrics::MetricsService;

/// Cleaned records per datastore batch
pub const BATCH_SIZE: usize = 2_000;

/// Floor on progress persistence frequency
pub const PROGRESS_INTERVAL_MS: u64 = 2_000;

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub progress_interval: Duration,
    pub batch_insert_timeout: Duration,
    pub cleaner: CleanerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            progress_interval: Duration::from_millis(PROGRESS_INTERVAL_MS),
            batch_insert_timeout: Duration::from_secs(30),
            cleaner: CleanerConfig::default(),
        }
    }
}

/// Where to pick up the stream and which counters to carry forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunParams {
    pub resume_from: u64,
    pub initial_inserted: u64,
    pub initial_rejected: u64,
}

/// How a run ended without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Paused,
}

/// Running totals of one processing run.
struct RunTotals {
    resume_base: u64,
    seen_this_run: u64,
    inserted: u64,
    rejected: u64,
    /// Bytes consumed of the stream; the stream restarts at byte zero on
    /// resume, so this is per-run and reconciled through the entity's
    /// monotonic guard
    bytes_processed: u64,
    /// Counter snapshot already reported to metrics
    reported: (u64, u64, u64),
}

impl RunTotals {
    fn rows_seen(&self) -> u64 {
        self.resume_base + self.seen_this_run
    }

    /// Deltas since the last metrics report
    fn unreported(&mut self) -> (u64, u64, u64) {
        let current = (self.rows_seen(), self.inserted, self.rejected);
        let delta = (
            current.0 - self.reported.0,
            current.1 - self.reported.1,
            current.2 - self.reported.2,
        );
        self.reported = current;
        delta
    }
}

/// Streams one job's source through parse, clean, and batched insert.
pub struct IngestionOrchestrator {
    jobs: Arc<dyn JobRepository>,
    store: Arc<dyn ObjectStore>,
    candidates: Arc<dyn CandidateStore>,
    metrics: Arc<MetricsService>,
    cleaner: RowCleaner,
    config: OrchestratorConfig,
}

impl IngestionOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        store: Arc<dyn ObjectStore>,
        candidates: Arc<dyn CandidateStore>,
        metrics: Arc<MetricsService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            jobs,
            store,
            candidates,
            metrics,
            cleaner: RowCleaner::new(config.cleaner),
            config,
        }
    }

    /// Runs one job to completion, pause, or failure.
    pub async fn run(
        &self,
        job_id: JobId,
        params: RunParams,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, IngestError> {
        let mut job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| IngestError::not_found(format!("Job not found: {}", job_id)))?;

        if job.is_terminal() {
            return Err(IngestError::invalid_state(format!(
                "Job {} is already {}",
                job.id, job.state
            )));
        }
        if job.stored_headers.is_empty() {
            return self
                .fail_job(
                    job,
                    IngestError::invalid_state(
                        "Job has no stored headers; mapping was never captured",
                    ),
                )
                .await;
        }

        // A job found in Processing means the previous worker crashed; its
        // persisted counters are the authoritative resume point.
        let params = if job.state == JobState::Processing {
            warn!(job_id = %job.id, rows_seen = job.rows_seen, "redelivered mid-processing, resuming from persisted counters");
            RunParams {
                resume_from: job.rows_seen,
                initial_inserted: job.rows_inserted,
                initial_rejected: job.rows_rejected,
            }
        } else {
            params
        };

        let source_size = match self.store.size(&job.storage_key).await {
            Ok(size) => size,
            Err(e) if e.is_not_found() => {
                return self
                    .fail_job(job, IngestError::not_found("Source file not found"))
                    .await;
            }
            Err(e) => {
                return self
                    .fail_job(job, IngestError::io_error(format!("Source file unreadable: {}", e)))
                    .await;
            }
        };

        job.source_size_bytes = Some(source_size);
        job.begin_processing()?;
        self.jobs.update(&job).await?;
        self.metrics.record_job_started();
        info!(
            job_id = %job.id,
            source = %job.storage_key,
            source_size,
            resume_from = params.resume_from,
            "processing started"
        );

        match self.stream_source(&mut job, params, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_recoverable() => {
                // Leave the job in Processing: the queue redelivers with
                // backoff and the redelivered run resumes from the counters
                // persisted so far
                warn!(job_id = %job.id, error = %e, "processing interrupted, leaving job for redelivery");
                self.metrics.record_job_interrupted();
                Err(e)
            }
            Err(e) => {
                // Preserve whatever counters were already persisted
                error!(job_id = %job.id, error = %e, "processing failed");
                self.fail_job(job, e).await
            }
        }
    }

    /// The streaming loop; extracted so `run` can convert any error into a
    /// terminal `Failed` state in one place.
    async fn stream_source(
        &self,
        job: &mut UploadJob,
        params: RunParams,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, IngestError> {
        let skip = job.header_row_index + 1 + params.resume_from;
        let mut parser = RowParser::new(
            ParserOptions::new(job.delimiter)
                .skip_leading_lines(skip)
                .headers(job.stored_headers.clone()),
        );

        let mut totals = RunTotals {
            resume_base: params.resume_from,
            seen_this_run: 0,
            inserted: params.initial_inserted,
            rejected: params.initial_rejected,
            bytes_processed: 0,
            reported: (
                params.resume_from,
                params.initial_inserted,
                params.initial_rejected,
            ),
        };
        let mut batch: Vec<Candidate> = Vec::with_capacity(self.config.batch_size);
        let mut last_progress = Instant::now();

        let mut stream = self.store.get_range(&job.storage_key, 0, None).await?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            totals.bytes_processed += chunk.len() as u64;
            parser.feed(&chunk)?;

            while let Some(record) = parser.next_record() {
                self.consume_record(job, record.values, &mut batch, &mut totals);

                if batch.len() >= self.config.batch_size {
                    self.flush_batch(job, &mut batch, &mut totals).await?;
                    if let Some(outcome) = self.pause_gate(job, &mut totals, cancel).await? {
                        // The dropped stream cancels the range read
                        return Ok(outcome);
                    }
                    last_progress = Instant::now();
                }
            }

            if last_progress.elapsed() >= self.config.progress_interval {
                self.persist_progress(job, &mut totals).await?;
                last_progress = Instant::now();
            }
        }

        parser.finish()?;
        while let Some(record) = parser.next_record() {
            self.consume_record(job, record.values, &mut batch, &mut totals);
        }
        self.flush_batch(job, &mut batch, &mut totals).await?;

        self.persist_progress(job, &mut totals).await?;
        job.complete()?;
        self.jobs.update(job).await?;
        self.metrics.record_job_completed();
        info!(
            job_id = %job.id,
            rows_seen = job.rows_seen,
            rows_inserted = job.rows_inserted,
            rows_rejected = job.rows_rejected,
            "processing completed"
        );
        Ok(RunOutcome::Completed)
    }

    /// Maps, cleans, and routes one parsed record.
    fn consume_record(
        &self,
        job: &UploadJob,
        values: Vec<String>,
        batch: &mut Vec<Candidate>,
        totals: &mut RunTotals,
    ) {
        totals.seen_this_run += 1;

        // Arity check: a shifted row must never be inserted misaligned
        if values.len() != job.stored_headers.len() {
            debug!(
                job_id = %job.id,
                row = totals.rows_seen(),
                fields = values.len(),
                expected = job.stored_headers.len(),
                "arity mismatch, row rejected"
            );
            totals.rejected += 1;
            return;
        }

        let mut candidate = Candidate::with_provenance(&job.storage_key, job.id);
        for field in CandidateField::ALL {
            let value = job.mapping.resolve(field, &job.stored_headers, &values);
            if !value.is_empty() {
                candidate.set_field(field, value.to_string());
            }
        }

        match self.cleaner.clean(candidate) {
            CleanOutcome::Accepted(cleaned) => batch.push(cleaned),
            CleanOutcome::Rejected => totals.rejected += 1,
        }
    }

    /// Inserts the buffered batch with the fixed timeout.
    ///
    /// An insert failure or timeout counts the batch as rejected and the
    /// stream continues; only errors outside the insert itself are fatal.
    async fn flush_batch(
        &self,
        job: &UploadJob,
        batch: &mut Vec<Candidate>,
        totals: &mut RunTotals,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(batch);
        let size = records.len() as u64;

        let insert = self
            .candidates
            .insert_many(&records, InsertOptions { ordered: false });
        match tokio::time::timeout(self.config.batch_insert_timeout, insert).await {
            Ok(Ok(())) => {
                totals.inserted += size;
                debug!(job_id = %job.id, batch = size, "batch inserted");
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, batch = size, error = %e, "batch insert failed, counting batch as rejected");
                totals.rejected += size;
            }
            Err(_) => {
                warn!(job_id = %job.id, batch = size, "batch insert timed out, counting batch as rejected");
                totals.rejected += size;
            }
        }
        Ok(())
    }

    /// Persists progress and honors pause requests and shutdown.
    ///
    /// Reloading the record is what makes an externally set
    /// `pause_requested` flag visible; the reload also keeps any flag set
    /// between our ticks from being overwritten.
    async fn pause_gate(
        &self,
        job: &mut UploadJob,
        totals: &mut RunTotals,
        cancel: &CancellationToken,
    ) -> Result<Option<RunOutcome>, IngestError> {
        self.persist_progress(job, totals).await?;

        if job.pause_requested || cancel.is_cancelled() {
            job.pause()?;
            self.jobs.update(job).await?;
            self.metrics.record_job_paused();
            info!(
                job_id = %job.id,
                resume_from = ?job.resume_from,
                shutdown = cancel.is_cancelled(),
                "processing paused"
            );
            return Ok(Some(RunOutcome::Paused));
        }
        Ok(None)
    }

    /// Writes current counters through a fresh read of the record.
    async fn persist_progress(
        &self,
        job: &mut UploadJob,
        totals: &mut RunTotals,
    ) -> Result<(), IngestError> {
        let mut fresh = self
            .jobs
            .find_by_id(job.id)
            .await?
            .ok_or_else(|| IngestError::not_found(format!("Job vanished: {}", job.id)))?;
        fresh.source_size_bytes = job.source_size_bytes;
        fresh.record_progress(
            totals.rows_seen(),
            totals.inserted,
            totals.rejected,
            totals.bytes_processed,
        )?;
        self.jobs.update(&fresh).await?;
        *job = fresh;

        let (seen, inserted, rejected) = totals.unreported();
        self.metrics.record_rows(seen, inserted, rejected);
        Ok(())
    }

    /// Marks the job failed, preserving counters, and propagates the
    /// original error so the worker can distinguish terminal from
    /// transient failures.
    async fn fail_job(
        &self,
        mut job: UploadJob,
        error: IngestError,
    ) -> Result<RunOutcome, IngestError> {
        let was_processing = job.state == JobState::Processing;
        if let Err(e) = job.fail(error.to_string()) {
            // Already terminal; nothing left to record
            warn!(job_id = %job.id, error = %e, "could not mark job failed");
        } else {
            self.jobs.update(&job).await?;
            if was_processing {
                self.metrics.record_job_failed();
            }
        }
        Err(error)
    }
}
