// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Assembler
//!
//! Accepts the sequential chunks of a client upload, grows the assembled
//! object in the store, and on the final chunk runs header detection and
//! hands back the decoded headers with the storage key.
//!
//! ## Upload protocol
//!
//! One logical upload is identified by `(user_id, file_name)`. Chunk 0
//! opens a manifest and fixes the deterministic storage key
//! `uploads/{user}/{stamp}_{sanitized_name}`; every following chunk must
//! arrive in order because the store append is read-modify-write. The
//! caller must surface per-chunk success before the client advances its
//! index; a retry of a chunk whose append failed is accepted (the failed
//! attempt never recorded the index), while a replay of a recorded index
//! is rejected instead of silently corrupting the object.
//!
//! Chunk 0 arriving while a previous upload of the same file already made
//! progress starts a fresh upload under a new stamp, which is how an
//! abandoned upload is restarted without a cleanup call.
//!
//! The manifest registry is in-process state: losing it abandons partial
//! uploads (the client restarts from chunk 0), but never corrupts a
//! finalized object.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info};

use candidate_ingest_domain::services::header_detector;
use candidate_ingest_domain::services::object_store::read_prefix;
use candidate_ingest_domain::{
    ChunkManifest, Delimiter, IngestError, ObjectStore, StorageKey,
};

use crate::infrastructure::metrics::MetricsService;

/// Content type of assembled uploads
const UPLOAD_CONTENT_TYPE: &str = "text/csv";

/// Result of receiving one chunk.
#[derive(Debug, Clone)]
pub enum ChunkUploadStatus {
    /// More chunks expected
    InProgress { progress_pct: u8 },
    /// Upload assembled; headers detected on the finished object
    Complete {
        storage_key: StorageKey,
        headers: Vec<String>,
        header_row_index: u64,
        delimiter: Delimiter,
    },
}

/// Assembles chunked uploads into stored objects.
pub struct ChunkAssembler {
    store: Arc<dyn ObjectStore>,
    metrics: Arc<MetricsService>,
    manifests: Mutex<HashMap<(String, String), ChunkManifest>>,
}

impl ChunkAssembler {
    pub fn new(store: Arc<dyn ObjectStore>, metrics: Arc<MetricsService>) -> Self {
        Self {
            store,
            metrics,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    /// Receives one chunk of a logical upload.
    pub async fn receive_chunk(
        &self,
        user_id: &str,
        file_name: &str,
        chunk_index: u32,
        total_chunks: u32,
        bytes: Vec<u8>,
    ) -> Result<ChunkUploadStatus, IngestError> {
        let upload_id = (user_id.to_string(), file_name.to_string());
        let chunk_len = bytes.len() as u64;

        // Validate against the manifest without recording yet; the index is
        // only recorded once the append succeeded, so a failed append stays
        // retryable.
        let storage_key = {
            let mut manifests = self.manifests.lock();

            // Chunk 0 over an upload that already made progress restarts it
            let restart = matches!(
                manifests.get(&upload_id),
                Some(m) if chunk_index == 0 && m.chunks_received > 0
            );
            if restart {
                info!(user_id, file_name, "restarting upload under a new storage key");
                manifests.remove(&upload_id);
            }

            if !manifests.contains_key(&upload_id) {
                if chunk_index != 0 {
                    return Err(IngestError::chunk_error(format!(
                        "Chunk {} of {} arrived without chunk 0 opening the upload",
                        chunk_index, file_name
                    )));
                }
                manifests.insert(
                    upload_id.clone(),
                    Self::open_manifest(user_id, file_name, total_chunks)?,
                );
            }
            let manifest = manifests.get_mut(&upload_id).ok_or_else(|| {
                IngestError::internal_error(format!("Upload manifest vanished for {}", file_name))
            })?;

            if manifest.total_chunks != total_chunks {
                return Err(IngestError::chunk_error(format!(
                    "Upload {} announced {} chunks but chunk {} claims {}",
                    file_name, manifest.total_chunks, chunk_index, total_chunks
                )));
            }
            if chunk_index != manifest.chunks_received {
                return Err(IngestError::chunk_error(format!(
                    "Chunk {} out of sequence for {} (expected {})",
                    chunk_index, file_name, manifest.chunks_received
                )));
            }
            manifest.storage_key.clone()
        };

        let total_bytes = self.store.append_via_rewrite(&storage_key, bytes).await?;
        self.metrics.record_chunk_received();

        // Append succeeded; now the index is recorded
        let (progress, complete) = {
            let mut manifests = self.manifests.lock();
            let manifest = manifests.get_mut(&upload_id).ok_or_else(|| {
                IngestError::chunk_error(format!("Upload manifest vanished for {}", file_name))
            })?;
            manifest.record_chunk(chunk_index, chunk_len)?;
            (manifest.progress_percent(), manifest.is_complete())
        };
        debug!(
            user_id,
            file_name,
            chunk_index,
            total_chunks,
            total_bytes,
            progress,
            "chunk appended"
        );

        if !complete {
            return Ok(ChunkUploadStatus::InProgress { progress_pct: progress });
        }

        // Final chunk: detect headers on the assembled object before
        // returning control to the client
        let prefix = read_prefix(
            self.store.as_ref(),
            &storage_key,
            header_detector::HEADER_SCAN_BYTES,
        )
        .await?;
        let detection = header_detector::detect(&prefix, &[])?;

        self.manifests.lock().remove(&upload_id);
        info!(
            user_id,
            file_name,
            storage_key = %storage_key,
            total_bytes,
            headers = detection.headers.len(),
            "upload assembled"
        );

        Ok(ChunkUploadStatus::Complete {
            storage_key,
            headers: detection.headers,
            header_row_index: detection.header_row_index,
            delimiter: detection.delimiter,
        })
    }

    /// Uploads in flight; manifests are destroyed on completion
    pub fn active_uploads(&self) -> usize {
        self.manifests.lock().len()
    }

    fn open_manifest(
        user_id: &str,
        file_name: &str,
        total_chunks: u32,
    ) -> Result<ChunkManifest, IngestError> {
        let stamp = Utc::now().timestamp_millis() as u64;
        let key = StorageKey::for_upload(user_id, stamp, file_name);
        ChunkManifest::new(key, total_chunks)
    }
}
