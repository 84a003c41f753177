// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cooperative pause and resume: batch-boundary pause latency, resume
//! bookkeeping, and equivalence with a straight-through run.

use candidate_ingest::application::services::ingestion_orchestrator::OrchestratorConfig;
use candidate_ingest::{CreateJobRequest, RunParams};
use candidate_ingest_bootstrap::CancellationToken;
use candidate_ingest_domain::{CandidateStore, FieldMapping, JobRepository, JobState};

use crate::integration::common::{harness_with, Harness};

fn small_batches() -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size: 10,
        ..OrchestratorConfig::default()
    }
}

fn csv_rows(n: usize) -> String {
    let mut body = String::from("name,email\n");
    for i in 0..n {
        body.push_str(&format!("Person {},p{}@x.io\n", i, i));
    }
    body
}

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
async fn pause_lands_on_the_first_batch_boundary() {
    let h = harness_with(small_batches()).await;
    let job_id = create(&h, "uploads/u1/1_pause.csv", &csv_rows(35)).await;

    // The flag is set before the worker ever runs, so the orchestrator
    // sees it at the first gate
    h.job_control.pause(job_id).await.unwrap();
    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Paused);
    assert_eq!(job.rows_seen, 10);
    assert_eq!(job.resume_from, Some(10));
    assert!(!job.pause_requested);
    assert_eq!(h.candidates.count().await.unwrap(), 10);
}

#[tokio::test]
async fn resume_continues_to_completion() {
    let h = harness_with(small_batches()).await;
    let job_id = create(&h, "uploads/u1/1_resume.csv", &csv_rows(35)).await;

    h.job_control.pause(job_id).await.unwrap();
    h.drain_queue().await;

    h.job_control.resume(job_id).await.unwrap();
    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (35, 35, 0)
    );
}

#[tokio::test]
async fn paused_run_matches_straight_run() {
    let straight = harness_with(small_batches()).await;
    let straight_id = create(&straight, "uploads/u1/1_straight.csv", &csv_rows(100)).await;
    straight.drain_queue().await;
    let straight_job = straight.jobs.find_by_id(straight_id).await.unwrap().unwrap();
    assert_eq!(straight_job.state, JobState::Completed);
    let straight_inserted = straight_job.rows_inserted;

    let paused = harness_with(small_batches()).await;
    let paused_id = create(&paused, "uploads/u1/1_paused.csv", &csv_rows(100)).await;
    paused.job_control.pause(paused_id).await.unwrap();
    paused.drain_queue().await;
    paused.job_control.resume(paused_id).await.unwrap();
    paused.drain_queue().await;

    let paused_job = paused.jobs.find_by_id(paused_id).await.unwrap().unwrap();
    assert_eq!(paused_job.state, JobState::Completed);
    assert_eq!(paused_job.rows_seen, 100);
    // Duplicates are allowed but never losses
    assert!(paused_job.rows_inserted >= straight_inserted);
    assert_eq!(
        paused.candidates.count().await.unwrap(),
        paused_job.rows_inserted
    );
}

#[tokio::test]
async fn shutdown_token_pauses_like_a_pause_request() {
    let h = harness_with(small_batches()).await;
    let job_id = create(&h, "uploads/u1/1_shutdown.csv", &csv_rows(30)).await;

    let token = CancellationToken::new();
    token.cancel();
    let outcome = h
        .orchestrator
        .run(job_id, RunParams::default(), &token)
        .await
        .unwrap();
    assert_eq!(outcome, candidate_ingest::RunOutcome::Paused);

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Paused);
    assert_eq!(job.rows_seen, 10);
    assert_eq!(job.resume_from, Some(10));
}

#[tokio::test]
async fn pause_on_terminal_job_is_a_noop() {
    let h = harness_with(small_batches()).await;
    let job_id = create(&h, "uploads/u1/1_term.csv", &csv_rows(5)).await;
    h.drain_queue().await;

    h.job_control.pause(job_id).await.unwrap();
    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert!(!job.pause_requested);
}

#[tokio::test]
async fn counters_stay_monotonic_across_status_samples() {
    let h = harness_with(small_batches()).await;
    let job_id = create(&h, "uploads/u1/1_mono.csv", &csv_rows(50)).await;

    h.job_control.pause(job_id).await.unwrap();
    h.drain_queue().await;
    let sample1 = h.job_control.status(job_id).await.unwrap();

    h.job_control.resume(job_id).await.unwrap();
    h.drain_queue().await;
    let sample2 = h.job_control.status(job_id).await.unwrap();

    assert!(sample2.rows_seen >= sample1.rows_seen);
    assert!(sample2.rows_inserted >= sample1.rows_inserted);
    assert!(sample2.rows_rejected >= sample1.rows_rejected);
    for sample in [&sample1, &sample2] {
        assert!(sample.rows_inserted + sample.rows_rejected <= sample.rows_seen);
    }
}
