// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services: chunk assembly, the ingestion orchestrator, and
//! the job control API.

pub mod chunk_assembler;
pub mod ingestion_orchestrator;
pub mod job_control;

pub use chunk_assembler::{ChunkAssembler, ChunkUploadStatus};
pub use ingestion_orchestrator::{
    IngestionOrchestrator, OrchestratorConfig, RunOutcome, RunParams, BATCH_SIZE,
    PROGRESS_INTERVAL_MS,
};
pub use job_control::{CreateJobRequest, JobControlService, JobRunRequest, JobStatusView};
