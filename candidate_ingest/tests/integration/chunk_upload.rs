// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Chunked upload assembly: sequential protocol, deterministic object
//! bytes, duplicate and out-of-order rejection, and the upload-to-job
//! handoff.

use candidate_ingest::{ChunkUploadStatus, CreateJobRequest};
use candidate_ingest_domain::{CandidateStore, Delimiter, FieldMapping, JobRepository, JobState};

use crate::integration::common::harness;

const BODY: &[u8] = b"name,email\nAda,ada@x.io\nGrace,grace@x.io\n";

#[tokio::test]
async fn sequential_chunks_assemble_the_exact_bytes() {
    let h = harness().await;

    // Split mid-record on purpose; chunk boundaries must be invisible
    let parts: [&[u8]; 3] = [&BODY[..7], &BODY[7..23], &BODY[23..]];
    let total = parts.len() as u32;

    let mut final_status = None;
    for (index, part) in parts.iter().enumerate() {
        let status = h
            .assembler
            .receive_chunk("u1", "people.csv", index as u32, total, part.to_vec())
            .await
            .unwrap();
        match status {
            ChunkUploadStatus::InProgress { progress_pct } => {
                let expected = ((index + 1) as f64 / total as f64 * 100.0).round() as u8;
                assert_eq!(progress_pct, expected);
            }
            ChunkUploadStatus::Complete { .. } => final_status = Some(status),
        }
    }

    let Some(ChunkUploadStatus::Complete {
        storage_key,
        headers,
        header_row_index,
        delimiter,
    }) = final_status
    else {
        panic!("upload never completed");
    };

    assert_eq!(headers, vec!["name", "email"]);
    assert_eq!(header_row_index, 0);
    assert_eq!(delimiter, Delimiter::Comma);
    assert!(storage_key.as_str().starts_with("uploads/u1/"));
    assert!(storage_key.as_str().ends_with("_people.csv"));
    assert_eq!(h.store.raw(&storage_key).unwrap(), BODY);
    assert_eq!(h.assembler.active_uploads(), 0);
}

#[tokio::test]
async fn single_chunk_upload_completes_immediately() {
    let h = harness().await;
    let status = h
        .assembler
        .receive_chunk("u1", "one.csv", 0, 1, BODY.to_vec())
        .await
        .unwrap();
    assert!(matches!(status, ChunkUploadStatus::Complete { .. }));
}

#[tokio::test]
async fn duplicate_chunk_is_rejected_and_object_unchanged() {
    let h = harness().await;
    h.assembler
        .receive_chunk("u1", "dup.csv", 0, 3, BODY[..10].to_vec())
        .await
        .unwrap();

    let err = h
        .assembler
        .receive_chunk("u1", "dup.csv", 0, 3, BODY[..10].to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "chunk");

    // The replay appended nothing: the next sequential chunk still fits
    let status = h
        .assembler
        .receive_chunk("u1", "dup.csv", 1, 3, BODY[10..20].to_vec())
        .await
        .unwrap();
    assert!(matches!(
        status,
        ChunkUploadStatus::InProgress { progress_pct: 67 }
    ));
}

#[tokio::test]
async fn out_of_order_chunk_is_rejected() {
    let h = harness().await;
    h.assembler
        .receive_chunk("u1", "ooo.csv", 0, 3, BODY[..10].to_vec())
        .await
        .unwrap();
    let err = h
        .assembler
        .receive_chunk("u1", "ooo.csv", 2, 3, BODY[20..].to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "chunk");
}

#[tokio::test]
async fn chunk_without_an_opened_upload_is_rejected() {
    let h = harness().await;
    let err = h
        .assembler
        .receive_chunk("u1", "noopen.csv", 1, 3, BODY[..5].to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "chunk");
}

#[tokio::test]
async fn inconsistent_total_chunks_is_rejected() {
    let h = harness().await;
    h.assembler
        .receive_chunk("u1", "totals.csv", 0, 3, BODY[..5].to_vec())
        .await
        .unwrap();
    let err = h
        .assembler
        .receive_chunk("u1", "totals.csv", 1, 4, BODY[5..].to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "chunk");
}

#[tokio::test]
async fn restarted_upload_gets_a_fresh_object() {
    let h = harness().await;
    h.assembler
        .receive_chunk("u1", "restart.csv", 0, 2, b"partial,".to_vec())
        .await
        .unwrap();

    // New stamps are per-millisecond; make sure the restart gets its own
    tokio::time::sleep(std::time::Duration::from_millis(3)).await;

    let status = h
        .assembler
        .receive_chunk("u1", "restart.csv", 0, 1, BODY.to_vec())
        .await
        .unwrap();
    let ChunkUploadStatus::Complete { storage_key, .. } = status else {
        panic!("restarted upload should complete");
    };
    assert_eq!(h.store.raw(&storage_key).unwrap(), BODY);
}

#[tokio::test]
async fn uploaded_file_processes_end_to_end() {
    let h = harness().await;

    let chunks: Vec<&[u8]> = BODY.chunks(11).collect();
    let total = chunks.len() as u32;
    let mut storage_key = None;
    for (index, chunk) in chunks.into_iter().enumerate() {
        if let ChunkUploadStatus::Complete { storage_key: key, .. } = h
            .assembler
            .receive_chunk("u1", "e2e.csv", index as u32, total, chunk.to_vec())
            .await
            .unwrap()
        {
            storage_key = Some(key);
        }
    }
    let storage_key = storage_key.expect("upload completed");

    let job_id = h
        .job_control
        .create_job(CreateJobRequest {
            user_id: "u1".to_string(),
            storage_key: storage_key.to_string(),
            original_name: "e2e.csv".to_string(),
            mapping: FieldMapping::from_pairs([("fullName", "name"), ("email", "email")]).unwrap(),
            headers: Vec::new(),
        })
        .await
        .unwrap();
    h.drain_queue().await;

    let job = h.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.rows_inserted, 2);
    assert_eq!(h.candidates.count().await.unwrap(), 2);
}
