// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared harness for the integration suite: the full service graph wired
//! over an in-memory object store and an in-memory SQLite database, plus a
//! deterministic queue-drain that mirrors the worker's settling policy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use candidate_ingest::application::services::ingestion_orchestrator::OrchestratorConfig;
use candidate_ingest::application::services::job_control::JobRunRequest;
use candidate_ingest::infrastructure::repositories::in_memory_pool;
use candidate_ingest::infrastructure::runtime::QueueConfig;
use candidate_ingest::{
    ChunkAssembler, IngestionOrchestrator, JobControlService, MemoryObjectStore, MetricsService,
    RunParams, SqliteCandidateStore, SqliteJobQueue, SqliteJobRepository,
};
use candidate_ingest_bootstrap::CancellationToken;
use candidate_ingest_domain::services::object_store::ByteStream;
use candidate_ingest_domain::{IngestError, JobQueue, ObjectStore, StorageKey};

pub struct Harness {
    pub store: Arc<MemoryObjectStore>,
    pub jobs: Arc<SqliteJobRepository>,
    pub candidates: Arc<SqliteCandidateStore>,
    pub queue: Arc<SqliteJobQueue>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub job_control: Arc<JobControlService>,
    pub assembler: Arc<ChunkAssembler>,
    pub pool: sqlx::SqlitePool,
}

/// Full stack with default processing settings.
pub async fn harness() -> Harness {
    harness_with(OrchestratorConfig::default()).await
}

/// Full stack with custom orchestrator settings (small batches, strict
/// cleaning) for tests that need several batch boundaries.
pub async fn harness_with(config: OrchestratorConfig) -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    build(config, store.clone(), store).await
}

/// Full stack whose orchestrator reads through `reads`, while seeding and
/// raw assertions keep using `store`.
pub async fn harness_with_read_store(
    config: OrchestratorConfig,
    store: Arc<MemoryObjectStore>,
    reads: Arc<dyn ObjectStore>,
) -> Harness {
    build(config, store, reads).await
}

async fn build(
    config: OrchestratorConfig,
    store: Arc<MemoryObjectStore>,
    reads: Arc<dyn ObjectStore>,
) -> Harness {
    let pool = in_memory_pool().await.expect("in-memory pool");
    let metrics = Arc::new(MetricsService::new().expect("metrics"));
    let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
    let candidates = Arc::new(SqliteCandidateStore::new(pool.clone()));
    let queue = Arc::new(SqliteJobQueue::new(
        pool.clone(),
        QueueConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(20),
            lease: Duration::from_secs(60),
        },
    ));
    let orchestrator = Arc::new(IngestionOrchestrator::new(
        jobs.clone(),
        reads.clone(),
        candidates.clone(),
        metrics.clone(),
        config,
    ));
    let job_control = Arc::new(JobControlService::new(
        jobs.clone(),
        queue.clone(),
        reads.clone(),
    ));
    let assembler = Arc::new(ChunkAssembler::new(reads, metrics));

    Harness {
        store,
        jobs,
        candidates,
        queue,
        orchestrator,
        job_control,
        assembler,
        pool,
    }
}

impl Harness {
    pub async fn seed_object(&self, key: &str, bytes: &[u8]) -> StorageKey {
        let key = StorageKey::parse(key).expect("valid key");
        self.store
            .put(&key, bytes.to_vec(), "text/csv")
            .await
            .expect("seed object");
        key
    }

    /// Claims and runs queue entries until the queue yields nothing,
    /// settling exactly the way the worker does. Backoff delays are
    /// slept through, so nacked entries get their retries.
    pub async fn drain_queue(&self) {
        loop {
            match self.queue.claim_next().await.expect("claim") {
                Some(entry) => {
                    let request: JobRunRequest =
                        serde_json::from_value(entry.payload.clone()).expect("payload");
                    let params = RunParams {
                        resume_from: request.resume_from,
                        initial_inserted: request.initial_inserted,
                        initial_rejected: request.initial_rejected,
                    };
                    let token = CancellationToken::new();
                    match self
                        .orchestrator
                        .run(request.job_id, params, &token)
                        .await
                    {
                        Ok(_) => self.queue.ack(entry.id).await.expect("ack"),
                        Err(e) if e.is_recoverable() => {
                            self.queue.nack(entry.id, &e.to_string()).await.expect("nack");
                        }
                        Err(_) => self.queue.ack(entry.id).await.expect("ack terminal"),
                    }
                }
                None => {
                    if self.queue.pending_count().await.expect("pending") == 0 {
                        return;
                    }
                    // Entries backing off; wait for them to come due
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
            }
        }
    }

    /// Rows of the candidates table matching a SQL predicate, for content
    /// assertions.
    pub async fn candidate_field(&self, column: &str, row: u32) -> String {
        let query = format!(
            "SELECT {} AS v FROM candidates ORDER BY rowid_pk LIMIT 1 OFFSET {}",
            column, row
        );
        let record = sqlx::query_as::<_, (String,)>(&query)
            .fetch_one(&self.pool)
            .await
            .expect("candidate row");
        record.0
    }
}

/// Object store wrapper whose first `fail_reads` range reads yield one
/// chunk and then a transient I/O error; later reads pass through. Models
/// a flaky source for redelivery tests.
pub struct FlakyObjectStore {
    inner: Arc<MemoryObjectStore>,
    remaining_failures: AtomicU32,
}

impl FlakyObjectStore {
    pub fn new(inner: Arc<MemoryObjectStore>, fail_reads: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(fail_reads),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), IngestError> {
        self.inner.put(key, bytes, content_type).await
    }

    async fn get_range(
        &self,
        key: &StorageKey,
        start: u64,
        end_inclusive: Option<u64>,
    ) -> Result<ByteStream, IngestError> {
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            let bytes = self
                .inner
                .raw(key)
                .ok_or_else(|| IngestError::not_found(format!("Object not found: {}", key)))?;
            let first = bytes.into_iter().take(16).collect::<Vec<u8>>();
            let stream = futures::stream::iter(vec![
                Ok(first),
                Err(IngestError::io_error("connection reset mid-stream")),
            ]);
            return Ok(Box::pin(stream));
        }
        self.inner.get_range(key, start, end_inclusive).await
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, IngestError> {
        self.inner.exists(key).await
    }

    async fn size(&self, key: &StorageKey) -> Result<u64, IngestError> {
        self.inner.size(key).await
    }

    async fn append_via_rewrite(
        &self,
        key: &StorageKey,
        chunk: Vec<u8>,
    ) -> Result<u64, IngestError> {
        self.inner.append_via_rewrite(key, chunk).await
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), IngestError> {
        self.inner.delete(key).await
    }
}
