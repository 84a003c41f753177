// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! The in-repo stand-in for the external HTTP layer: every subcommand maps
//! one-to-one onto the chunk-upload and job-control contracts, so the full
//! pipeline can be driven, observed, paused, and resumed from a shell.
//!
//! ```bash
//! candidate_ingest upload --user u1 candidates.csv
//! candidate_ingest headers uploads/u1/1700000000000_candidates.csv
//! candidate_ingest process --user u1 --storage-key uploads/u1/..._candidates.csv \
//!     --mapping '{"fullName":"Full Name","email":"Email"}'
//! candidate_ingest status 01HW3V5T9R...
//! candidate_ingest worker
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use candidate_ingest_bootstrap::ShutdownCoordinator;
use candidate_ingest_domain::services::header_detector;
use candidate_ingest_domain::services::object_store::read_prefix;
use candidate_ingest_domain::{FieldMapping, IngestError, JobId, JobQueue, ObjectStore, StorageKey};

use crate::application::services::{
    ChunkAssembler, ChunkUploadStatus, CreateJobRequest, IngestionOrchestrator, JobControlService,
};
use crate::infrastructure::runtime::{join_supervised, spawn_supervised, Worker};

/// Default chunk size for CLI-driven uploads
const DEFAULT_CHUNK_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "candidate_ingest",
    about = "Streaming candidate file ingestion pipeline",
    version
)]
pub struct Cli {
    /// Path of the TOML configuration file
    #[arg(long, global = true, default_value = "candidate_ingest.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a local file in sequential chunks and assemble it
    Upload {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Local file to upload
        file: PathBuf,
        /// Chunk size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_BYTES)]
        chunk_size: usize,
    },
    /// Detect delimiter and headers of a stored object
    Headers {
        /// Storage key of the assembled object
        storage_key: String,
    },
    /// Create a processing job for an assembled upload
    Process {
        #[arg(long)]
        user: String,
        #[arg(long)]
        storage_key: String,
        /// Original file name shown in history; defaults to the key's tail
        #[arg(long)]
        name: Option<String>,
        /// Mapping from destination fields to source headers, as JSON
        #[arg(long)]
        mapping: String,
    },
    /// Show state, counters, and timestamps of a job
    Status { job_id: String },
    /// Request a cooperative pause
    Pause { job_id: String },
    /// Re-enqueue a paused or finished job from its last counters
    Resume { job_id: String },
    /// List a user's jobs, newest first
    List { user: String },
    /// Run the ingestion worker until ctrl-c
    Worker,
}

/// Wired services the commands run against.
pub struct AppServices {
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub assembler: Arc<ChunkAssembler>,
    pub job_control: Arc<JobControlService>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub poll_interval: std::time::Duration,
}

/// Executes one CLI command against the wired services.
pub async fn run_command(command: Command, services: &AppServices) -> Result<(), IngestError> {
    match command {
        Command::Upload {
            user,
            file,
            chunk_size,
        } => upload(services, &user, &file, chunk_size).await,
        Command::Headers { storage_key } => headers(services, &storage_key).await,
        Command::Process {
            user,
            storage_key,
            name,
            mapping,
        } => process(services, user, storage_key, name, &mapping).await,
        Command::Status { job_id } => {
            let status = services.job_control.status(JobId::from_string(&job_id)?).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Pause { job_id } => {
            services.job_control.pause(JobId::from_string(&job_id)?).await?;
            println!("pause requested for {}", job_id);
            Ok(())
        }
        Command::Resume { job_id } => {
            services.job_control.resume(JobId::from_string(&job_id)?).await?;
            println!("resume enqueued for {}", job_id);
            Ok(())
        }
        Command::List { user } => {
            let history = services.job_control.list_history(&user).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
        Command::Worker => worker(services).await,
    }
}

/// Splits a local file into sequential chunks through the assembler, the
/// same path a remote client takes per-request.
async fn upload(
    services: &AppServices,
    user: &str,
    file: &PathBuf,
    chunk_size: usize,
) -> Result<(), IngestError> {
    if chunk_size == 0 {
        return Err(IngestError::validation_error("chunk size must be positive"));
    }
    let bytes = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| IngestError::validation_error("upload path has no file name"))?;

    let chunks: Vec<&[u8]> = if bytes.is_empty() {
        vec![&[]]
    } else {
        bytes.chunks(chunk_size).collect()
    };
    let total = chunks.len() as u32;

    for (index, chunk) in chunks.into_iter().enumerate() {
        let status = services
            .assembler
            .receive_chunk(user, &file_name, index as u32, total, chunk.to_vec())
            .await?;
        match status {
            ChunkUploadStatus::InProgress { progress_pct } => {
                info!(chunk = index, progress_pct, "chunk received");
            }
            ChunkUploadStatus::Complete {
                storage_key,
                headers,
                header_row_index,
                delimiter,
            } => {
                println!("uploaded: {}", storage_key);
                println!("header row: {} ({} delimited)", header_row_index, delimiter);
                println!("headers: {}", headers.join(", "));
            }
        }
    }
    Ok(())
}

async fn headers(services: &AppServices, storage_key: &str) -> Result<(), IngestError> {
    let key = StorageKey::parse(storage_key)?;
    let prefix = read_prefix(
        services.store.as_ref(),
        &key,
        header_detector::HEADER_SCAN_BYTES,
    )
    .await?;
    let detection = header_detector::detect(&prefix, &[])?;
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

async fn process(
    services: &AppServices,
    user: String,
    storage_key: String,
    name: Option<String>,
    mapping_json: &str,
) -> Result<(), IngestError> {
    let mapping: FieldMapping = serde_json::from_str(mapping_json)?;
    let original_name = name.unwrap_or_else(|| {
        storage_key
            .rsplit('/')
            .next()
            .unwrap_or(storage_key.as_str())
            .to_string()
    });
    let job_id = services
        .job_control
        .create_job(CreateJobRequest {
            user_id: user,
            storage_key,
            original_name,
            mapping,
            headers: Vec::new(),
        })
        .await?;
    println!("job created: {}", job_id);
    Ok(())
}

/// Runs the worker loop under shutdown coordination: ctrl-c pauses the
/// in-flight job at the next batch boundary and drains cleanly.
async fn worker(services: &AppServices) -> Result<(), IngestError> {
    let coordinator = ShutdownCoordinator::default();
    coordinator.install_ctrl_c_handler();

    let worker = Arc::new(Worker::new(
        services.queue.clone(),
        services.orchestrator.clone(),
        services.poll_interval,
        coordinator.token(),
    ));
    let handle = spawn_supervised("ingestion-worker", {
        let worker = worker.clone();
        async move { worker.run().await }
    });

    let result = join_supervised(handle).await;
    coordinator.complete_shutdown();
    result
}
