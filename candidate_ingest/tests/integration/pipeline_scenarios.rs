// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end ingestion scenarios: seed an object, create a job through
//! the control API, drain the queue, and assert on counters, lifecycle,
//! and stored candidates.

use candidate_ingest::CreateJobRequest;
use candidate_ingest_domain::{CandidateStore, FieldMapping, JobRepository, JobState};

use crate::integration::common::harness;

fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
    FieldMapping::from_pairs(pairs.iter().copied()).expect("valid mapping")
}

#[tokio::test]
async fn two_line_csv_inserts_one_candidate() {
    let h = harness().await;
    let key = h.seed_object("uploads/u1/1_two.csv", b"name,email\nAda,ada@x.io\n").await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "two.csv".to_string(),
            mapping: mapping(&[("fullName", "name"), ("email", "email")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.header_row_index, 0);
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (1, 1, 0)
    );
    assert!(job.completed_at.is_some());

    assert_eq!(h.candidates.count().await.unwrap(), 1);
    assert_eq!(h.candidate_field("full_name", 0).await, "Ada");
    assert_eq!(h.candidate_field("email", 0).await, "ada@x.io");
    assert_eq!(h.candidate_field("source_file", 0).await, key.to_string());
}

#[tokio::test]
async fn garbage_preamble_processes_exactly_the_data_rows() {
    let h = harness().await;
    let mut body = String::new();
    body.push_str("export from CRM\n");
    body.push_str("generated at some point\n");
    body.push_str("-- do not edit --\n");
    body.push_str("Full Name,Email\n");
    for i in 0..5 {
        body.push_str(&format!("Person {},p{}@x.io\n", i, i));
    }
    let key = h.seed_object("uploads/u1/1_preamble.csv", body.as_bytes()).await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "preamble.csv".to_string(),
            mapping: mapping(&[("fullName", "Full Name"), ("email", "Email")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.header_row_index, 3);
    assert_eq!(job.stored_headers, vec!["Full Name", "Email"]);

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (5, 5, 0)
    );
}

#[tokio::test]
async fn row_without_contact_channel_is_rejected() {
    let h = harness().await;
    let body = "name,email,phone\nNo Contact,,\nAda,ada@x.io,\n";
    let key = h.seed_object("uploads/u1/1_contact.csv", body.as_bytes()).await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "contact.csv".to_string(),
            mapping: mapping(&[("fullName", "name"), ("email", "email"), ("phone", "phone")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (2, 1, 1)
    );
    // The row after the rejected one was accepted
    assert_eq!(h.candidate_field("full_name", 0).await, "Ada");
}

#[tokio::test]
async fn arity_mismatch_rejects_only_the_bad_row() {
    let h = harness().await;
    // Second data row has an unquoted extra comma: three fields against
    // two headers
    let body = "name,email\nAda,ada@x.io\nBad, Row,extra@x.io\nGrace,grace@x.io\n";
    let key = h.seed_object("uploads/u1/1_arity.csv", body.as_bytes()).await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "arity.csv".to_string(),
            mapping: mapping(&[("fullName", "name"), ("email", "email")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (3, 2, 1)
    );
    assert_eq!(h.candidate_field("full_name", 1).await, "Grace");
}

#[tokio::test]
async fn embedded_newline_survives_into_the_stored_record() {
    let h = harness().await;
    let body = "name,email,bio\nAda,ada@x.io,\"line1\nline2\"\n";
    let key = h.seed_object("uploads/u1/1_newline.csv", body.as_bytes()).await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "newline.csv".to_string(),
            mapping: mapping(&[
                ("fullName", "name"),
                ("email", "email"),
                ("summary", "bio"),
            ]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(
        (job.rows_seen, job.rows_inserted, job.rows_rejected),
        (1, 1, 0)
    );
    // Cleaning collapses the quoted newline into a single space
    assert_eq!(h.candidate_field("summary", 0).await, "line1 line2");
}

#[tokio::test]
async fn tab_separated_file_is_detected_and_processed() {
    let h = harness().await;
    let body = "name\temail\tcity\nAda\tada@x.io\tLondon\n";
    let key = h.seed_object("uploads/u1/1_data.tsv", body.as_bytes()).await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "data.tsv".to_string(),
            mapping: mapping(&[
                ("fullName", "name"),
                ("email", "email"),
                ("locality", "city"),
            ]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.rows_inserted, 1);
    assert_eq!(h.candidate_field("locality", 0).await, "London");
}

#[tokio::test]
async fn missing_source_fails_the_job_terminally() {
    let h = harness().await;
    let key = h.seed_object("uploads/u1/1_gone.csv", b"name,email\nAda,ada@x.io\n").await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "gone.csv".to_string(),
            mapping: mapping(&[("email", "email")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();

    // The object disappears between mapping and processing
    use candidate_ingest_domain::ObjectStore;
    h.store.delete(&key).await.unwrap();

    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("Not found: Source file not found"));
}

#[tokio::test]
async fn status_and_history_reflect_the_job() {
    let h = harness().await;
    let key = h.seed_object("uploads/u1/1_hist.csv", b"name,email\nAda,ada@x.io\n").await;

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: key.to_string(),
            original_name: "hist.csv".to_string(),
            mapping: mapping(&[("email", "email")]),
            headers: Vec::new(),
        })
        .await
        .unwrap();
    h.drain_queue().await;

    let status = h.job_control.status(job_id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.rows_inserted, 1);
    assert_eq!(status.progress_percent, Some(100));

    let history = h.job_control.list_history("u1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].job_id, job_id);
    assert!(h.job_control.list_history("someone-else").await.unwrap().is_empty());
}
