// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Metrics
//!
//! Prometheus registry wrapper for the pipeline's operational counters.
//! The service owns its registry and exposes typed update methods so
//! callers never touch metric names directly; `gather_text` renders the
//! standard exposition format for whatever surface wants to scrape it.

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use tracing::debug;

use candidate_ingest_domain::IngestError;

const NAMESPACE: &str = "candidate_ingest";

/// Registry-owning metrics service.
pub struct MetricsService {
    registry: Registry,
    rows_seen_total: IntCounter,
    rows_inserted_total: IntCounter,
    rows_rejected_total: IntCounter,
    chunks_received_total: IntCounter,
    jobs_started_total: IntCounter,
    jobs_completed_total: IntCounter,
    jobs_failed_total: IntCounter,
    jobs_paused_total: IntCounter,
    active_jobs: IntGauge,
}

impl MetricsService {
    pub fn new() -> Result<Self, IngestError> {
        let registry = Registry::new();

        let rows_seen_total = counter("rows_seen_total", "Rows read from source files")?;
        let rows_inserted_total = counter("rows_inserted_total", "Rows inserted into the datastore")?;
        let rows_rejected_total = counter("rows_rejected_total", "Rows rejected by validation")?;
        let chunks_received_total = counter("chunks_received_total", "Upload chunks received")?;
        let jobs_started_total = counter("jobs_started_total", "Jobs that entered processing")?;
        let jobs_completed_total = counter("jobs_completed_total", "Jobs completed")?;
        let jobs_failed_total = counter("jobs_failed_total", "Jobs failed terminally")?;
        let jobs_paused_total = counter("jobs_paused_total", "Cooperative pauses taken")?;
        let active_jobs = IntGauge::with_opts(
            Opts::new("active_jobs", "Jobs currently processing").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::metrics_error(format!("Failed to create active_jobs: {}", e)))?;

        for metric in [
            &rows_seen_total,
            &rows_inserted_total,
            &rows_rejected_total,
            &chunks_received_total,
            &jobs_started_total,
            &jobs_completed_total,
            &jobs_failed_total,
            &jobs_paused_total,
        ] {
            registry.register(Box::new(metric.clone())).map_err(|e| {
                IngestError::metrics_error(format!("Failed to register counter: {}", e))
            })?;
        }
        registry.register(Box::new(active_jobs.clone())).map_err(|e| {
            IngestError::metrics_error(format!("Failed to register active_jobs: {}", e))
        })?;

        debug!("metrics service initialized");

        Ok(Self {
            registry,
            rows_seen_total,
            rows_inserted_total,
            rows_rejected_total,
            chunks_received_total,
            jobs_started_total,
            jobs_completed_total,
            jobs_failed_total,
            jobs_paused_total,
            active_jobs,
        })
    }

    pub fn record_rows(&self, seen: u64, inserted: u64, rejected: u64) {
        self.rows_seen_total.inc_by(seen);
        self.rows_inserted_total.inc_by(inserted);
        self.rows_rejected_total.inc_by(rejected);
    }

    pub fn record_chunk_received(&self) {
        self.chunks_received_total.inc();
    }

    pub fn record_job_started(&self) {
        self.jobs_started_total.inc();
        self.active_jobs.inc();
    }

    pub fn record_job_completed(&self) {
        self.jobs_completed_total.inc();
        self.active_jobs.dec();
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed_total.inc();
        self.active_jobs.dec();
    }

    pub fn record_job_paused(&self) {
        self.jobs_paused_total.inc();
        self.active_jobs.dec();
    }

    /// A run that exited on a transient error and will be redelivered;
    /// only the active gauge moves
    pub fn record_job_interrupted(&self) {
        self.active_jobs.dec();
    }

    /// Renders the registry in Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String, IngestError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| IngestError::metrics_error(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| IngestError::metrics_error(format!("Metrics are not UTF-8: {}", e)))
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter, IngestError> {
    IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
        .map_err(|e| IngestError::metrics_error(format!("Failed to create {}: {}", name, e)))
}
