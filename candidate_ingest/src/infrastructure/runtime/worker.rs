// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Worker
//!
//! The queue consumer loop: claim, run the orchestrator, settle. The queue
//! enforces at-most-one claimed entry per job key, so any number of worker
//! processes over the same database still give each job a single active
//! run.
//!
//! ## Settling policy
//!
//! - a run that completes or pauses cleanly acks its entry
//! - a recoverable error (transient I/O, database, timeout) nacks, and
//!   the queue redelivers with backoff up to the attempt limit
//! - a terminal error acks: the job is already marked `Failed` with the
//!   reason, and redelivering a job whose source is gone cannot succeed
//!
//! The shutdown token is observed between claims and inside the
//! orchestrator's pause gate, so a ctrl-c lands as a persisted pause, not
//! a lost job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use candidate_ingest_bootstrap::CancellationToken;
use candidate_ingest_domain::{IngestError, JobQueue, QueueEntry};

use crate::application::services::ingestion_orchestrator::{
    IngestionOrchestrator, RunOutcome, RunParams,
};
use crate::application::services::job_control::JobRunRequest;

/// Queue consumer driving the ingestion orchestrator.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<IngestionOrchestrator>,
    poll_interval: Duration,
    token: CancellationToken,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<IngestionOrchestrator>,
        poll_interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            poll_interval,
            token,
        }
    }

    /// Runs until the shutdown token cancels.
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("ingestion worker started");
        loop {
            if self.token.is_cancelled() {
                break;
            }
            match self.queue.claim_next().await {
                Ok(Some(entry)) => self.process_entry(entry).await,
                Ok(None) => self.idle().await,
                Err(e) => {
                    error!(error = %e, "queue claim failed");
                    self.idle().await;
                }
            }
        }
        info!("ingestion worker stopped");
        Ok(())
    }

    async fn idle(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = self.token.cancelled() => {}
        }
    }

    async fn process_entry(&self, entry: QueueEntry) {
        let request: JobRunRequest = match serde_json::from_value(entry.payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                // A payload that cannot parse will never succeed; let the
                // attempt limit park it
                error!(entry_id = entry.id, error = %e, "malformed queue payload");
                self.settle_nack(entry.id, &format!("malformed payload: {}", e))
                    .await;
                return;
            }
        };

        let params = RunParams {
            resume_from: request.resume_from,
            initial_inserted: request.initial_inserted,
            initial_rejected: request.initial_rejected,
        };

        match self
            .orchestrator
            .run(request.job_id, params, &self.token)
            .await
        {
            Ok(RunOutcome::Completed) => {
                info!(job_id = %request.job_id, "run completed");
                self.settle_ack(entry.id).await;
            }
            Ok(RunOutcome::Paused) => {
                info!(job_id = %request.job_id, "run paused");
                self.settle_ack(entry.id).await;
            }
            Err(e) if e.is_recoverable() => {
                warn!(job_id = %request.job_id, attempts = entry.attempts, error = %e, "run failed transiently, redelivering");
                self.settle_nack(entry.id, &e.to_string()).await;
            }
            Err(e) => {
                // Terminal: the job record already carries the failure
                error!(job_id = %request.job_id, error = %e, "run failed terminally");
                self.settle_ack(entry.id).await;
            }
        }
    }

    async fn settle_ack(&self, entry_id: i64) {
        if let Err(e) = self.queue.ack(entry_id).await {
            warn!(entry_id, error = %e, "failed to ack queue entry");
        }
    }

    async fn settle_nack(&self, entry_id: i64, reason: &str) {
        if let Err(e) = self.queue.nack(entry_id, reason).await {
            warn!(entry_id, error = %e, "failed to nack queue entry");
        }
    }
}
