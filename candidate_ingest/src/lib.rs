// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Ingest
//!
//! Application and infrastructure layers of the candidate ingestion
//! pipeline: chunked upload assembly, the durable pausable ingestion job,
//! job control, SQLite persistence, the worker runtime, and the CLI that
//! stands in for the external HTTP surface.
//!
//! ## Layers
//!
//! - [`application`]: chunk assembler, ingestion orchestrator, job control
//! - [`infrastructure`]: object store adapters, SQLite repositories and
//!   queue, worker loop, configuration, metrics
//! - [`presentation`]: clap CLI over the control contracts
//!
//! Domain types (`UploadJob`, `RowParser`, `RowCleaner`, the ports) come
//! from the `candidate-ingest-domain` crate; entry-point concerns
//! (shutdown, exit codes) from `candidate-ingest-bootstrap`.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::services::{
    ChunkAssembler, ChunkUploadStatus, CreateJobRequest, IngestionOrchestrator,
    JobControlService, JobRunRequest, JobStatusView, OrchestratorConfig, RunOutcome, RunParams,
};
pub use infrastructure::adapters::{FsObjectStore, MemoryObjectStore};
pub use infrastructure::config::IngestConfig;
pub use infrastructure::metrics::MetricsService;
pub use infrastructure::repositories::{SqliteCandidateStore, SqliteJobRepository};
pub use infrastructure::runtime::{QueueConfig, SqliteJobQueue, Worker};
