// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Ingest Binary
//!
//! Composition root: initializes logging, loads and validates the
//! configuration (a missing storage bucket refuses startup), wires the
//! SQLite pool and adapters into the application services, and dispatches
//! the CLI command. Errors map to sysexits-style exit codes so process
//! supervisors can tell a configuration mistake from a transient failure.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use candidate_ingest::application::services::ingestion_orchestrator::OrchestratorConfig;
use candidate_ingest::infrastructure::config::IngestConfig;
use candidate_ingest::infrastructure::metrics::MetricsService;
use candidate_ingest::infrastructure::repositories::{
    ensure_schema, SqliteCandidateStore, SqliteJobRepository,
};
use candidate_ingest::infrastructure::runtime::{QueueConfig, SqliteJobQueue};
use candidate_ingest::presentation::cli::{run_command, AppServices, Cli};
use candidate_ingest::{ChunkAssembler, FsObjectStore, IngestionOrchestrator, JobControlService};
use candidate_ingest_bootstrap::ExitCode;
use candidate_ingest_domain::{CleanerConfig, IngestError};

fn main() {
    // RUST_LOG drives verbosity; default to info for our crates
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(ExitCode::Software.as_i32());
        }
    };

    let exit = match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            error!(error = %e, category = e.category(), "command failed");
            ExitCode::from_error_category(e.category())
        }
    };
    std::process::exit(exit.as_i32());
}

async fn run(cli: Cli) -> Result<(), IngestError> {
    let config = IngestConfig::load(&cli.config).await?;
    let services = wire_services(&config).await?;
    run_command(cli.command, &services).await
}

/// Builds the service graph from configuration.
async fn wire_services(config: &IngestConfig) -> Result<AppServices, IngestError> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            IngestError::database_error(format!(
                "Failed to open database {}: {}",
                config.database.url, e
            ))
        })?;
    ensure_schema(&pool).await?;
    debug!(url = %config.database.url, "database ready");

    let store = Arc::new(FsObjectStore::new(
        &config.storage.root_dir,
        &config.storage.bucket,
    )?);
    let metrics = Arc::new(MetricsService::new()?);
    let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
    let candidates = Arc::new(SqliteCandidateStore::new(pool.clone()));
    let queue = Arc::new(SqliteJobQueue::new(
        pool,
        QueueConfig {
            max_attempts: config.queue.max_attempts,
            initial_backoff: Duration::from_millis(config.queue.initial_backoff_ms),
            lease: Duration::from_secs(config.queue.lease_secs),
        },
    ));

    let orchestrator = Arc::new(IngestionOrchestrator::new(
        jobs.clone(),
        store.clone(),
        candidates,
        metrics.clone(),
        OrchestratorConfig {
            batch_size: config.processing.batch_size,
            progress_interval: config.progress_interval(),
            batch_insert_timeout: config.batch_insert_timeout(),
            cleaner: CleanerConfig {
                salvage_enabled: config.processing.salvage_enabled,
            },
        },
    ));
    let assembler = Arc::new(ChunkAssembler::new(store.clone(), metrics));
    let job_control = Arc::new(JobControlService::new(
        jobs,
        queue.clone(),
        store.clone(),
    ));

    Ok(AppServices {
        store,
        queue,
        assembler,
        job_control,
        orchestrator,
        poll_interval: config.poll_interval(),
    })
}
