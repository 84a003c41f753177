// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Manifest
//!
//! Transient bookkeeping for one in-flight chunked upload: the target
//! storage key, how many chunks the client announced, which indices have
//! arrived, and the byte total. Owned by the chunk assembler and destroyed
//! when the upload finalizes.
//!
//! The upload protocol is strictly sequential from a given client. Because
//! the store append is read-modify-write, replaying an index that already
//! succeeded would append its bytes twice and corrupt the object, so
//! `record_chunk` enforces that each arriving index is exactly the next
//! expected one. A retry of a chunk whose first attempt *failed* is fine:
//! the failed attempt never recorded the index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::StorageKey;
use crate::IngestError;

/// State of one chunked upload in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub id: Uuid,
    pub storage_key: StorageKey,
    pub total_chunks: u32,
    /// Count of chunks recorded so far; the protocol is sequential, so this
    /// doubles as the next expected index
    pub chunks_received: u32,
    pub bytes_received: u64,
    pub created_at: DateTime<Utc>,
}

impl ChunkManifest {
    /// Opens a manifest for a new logical upload
    pub fn new(storage_key: StorageKey, total_chunks: u32) -> Result<Self, IngestError> {
        if total_chunks == 0 {
            return Err(IngestError::chunk_error("Upload must have at least one chunk"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            storage_key,
            total_chunks,
            chunks_received: 0,
            bytes_received: 0,
            created_at: Utc::now(),
        })
    }

    /// Records the arrival of chunk `index` with `len` bytes.
    ///
    /// Rejects replays of already-recorded indices and gaps in the
    /// sequence; both would leave the assembled object corrupt.
    pub fn record_chunk(&mut self, index: u32, len: u64) -> Result<(), IngestError> {
        if index >= self.total_chunks {
            return Err(IngestError::chunk_error(format!(
                "Chunk index {} out of range for {} chunks",
                index, self.total_chunks
            )));
        }
        if index < self.chunks_received {
            return Err(IngestError::chunk_error(format!(
                "Chunk {} was already received for {}",
                index, self.storage_key
            )));
        }
        if index > self.chunks_received {
            return Err(IngestError::chunk_error(format!(
                "Chunk {} arrived out of order for {} (expected {})",
                index, self.storage_key, self.chunks_received
            )));
        }
        self.chunks_received += 1;
        self.bytes_received += len;
        Ok(())
    }

    /// True once every announced chunk arrived
    pub fn is_complete(&self) -> bool {
        self.chunks_received == self.total_chunks
    }

    /// Percent of chunks received, rounded
    pub fn progress_percent(&self) -> u8 {
        ((self.chunks_received as f64 / self.total_chunks as f64) * 100.0).round() as u8
    }
}
