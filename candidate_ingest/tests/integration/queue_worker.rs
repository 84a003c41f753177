// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Queue and worker behavior end to end: redelivery after transient
//! failures, stale-entry handling under concurrent resumes, the real
//! worker loop under a shutdown token, and dead-letter parking.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use candidate_ingest::application::services::ingestion_orchestrator::OrchestratorConfig;
use candidate_ingest::{CreateJobRequest, Worker};
use candidate_ingest_bootstrap::CancellationToken;
use candidate_ingest_domain::{CandidateStore, FieldMapping, JobQueue, JobRepository, JobState};

use crate::integration::common::{harness, harness_with_read_store, FlakyObjectStore, Harness};

async fn create(h: &Harness, key: &str, body: &str) -> candidate_ingest_domain::JobId {
    let key = h.seed_object(key, body.as_bytes()).await;
    h.job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "rows.csv".to_string(),
            mapping: FieldMapping::from_pairs([("fullName", "name"), ("email", "email")]).unwrap(),
            headers: Vec::new(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn transient_stream_failure_is_redelivered_and_completes() {
    let store = Arc::new(candidate_ingest::MemoryObjectStore::new());
    let flaky = Arc::new(FlakyObjectStore::new(store.clone(), 1));
    let h = harness_with_read_store(OrchestratorConfig::default(), store, flaky).await;

    let job_id = create(&h, "uploads/u1/1_flaky.csv", "name,email\nAda,ada@x.io\nGrace,g@x.io\n").await;
    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.rows_inserted, 2);
    assert_eq!(h.queue.pending_count().await.unwrap(), 0);
    assert_eq!(h.queue.dead_count().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_resumes_cause_at_most_one_processing_run() {
    let h = harness().await;
    let job_id = create(&h, "uploads/u1/1_multi.csv", "name,email\nAda,ada@x.io\n").await;
    h.drain_queue().await;
    assert_eq!(h.candidates.count().await.unwrap(), 1);

    // Two resumes race in from different clients
    h.job_control.resume(job_id).await.unwrap();
    h.job_control.resume(job_id).await.unwrap();
    assert_eq!(h.queue.pending_count().await.unwrap(), 2);

    h.drain_queue().await;

    // The second entry found the job terminal and was dropped; nothing
    // was double-processed past the resume point
    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(h.candidates.count().await.unwrap(), 1);
    assert_eq!(h.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn real_worker_loop_processes_and_shuts_down() {
    let h = harness().await;
    let token = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        h.queue.clone(),
        h.orchestrator.clone(),
        Duration::from_millis(10),
        token.clone(),
    ));
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    let job_id = create(&h, "uploads/u1/1_loop.csv", "name,email\nAda,ada@x.io\n").await;

    // Wait for the worker to pick it up and finish
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
        if job.state == JobState::Completed {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker exits on shutdown")
        .expect("worker task")
        .expect("worker result");
}

#[tokio::test]
async fn malformed_payload_is_parked_after_retries() {
    let h = harness().await;
    h.queue
        .enqueue("broken", json!({"nonsense": true}))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        h.queue.clone(),
        h.orchestrator.clone(),
        Duration::from_millis(5),
        token.clone(),
    ));
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.queue.dead_count().await.unwrap() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "entry never parked");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert_eq!(h.queue.dead_count().await.unwrap(), 1);
    assert_eq!(h.queue.pending_count().await.unwrap(), 0);
}
