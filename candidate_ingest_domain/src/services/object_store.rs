// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Store Port
//!
//! Thin capability surface over an external blob store. The domain defines
//! *what* storage operations exist; concrete adapters (filesystem-backed,
//! in-memory for tests, or a cloud SDK) live in the infrastructure layer.
//!
//! ## Contract notes
//!
//! - `get_range` returns an ordered byte stream; dropping the stream
//!   cancels the read, which is how the orchestrator abandons a source
//!   mid-pause without draining gigabytes
//! - `append_via_rewrite` is **not** a native append: adapters download the
//!   existing object (empty when absent), concatenate, and re-upload. That
//!   is acceptable for chunk sizes in the tens of megabytes and keeps the
//!   adapter portable across stores without a native append
//! - a missing object surfaces as `IngestError::NotFound`, which the chunk
//!   assembler interprets as "no prior chunks" and the orchestrator treats
//!   as terminal
//! - transient failures are retried inside adapters with bounded backoff;
//!   permanent failures propagate as typed errors

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::value_objects::StorageKey;
use crate::IngestError;

/// Ordered stream of byte slices from an object read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, IngestError>> + Send>>;

/// Capability surface over the blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads a complete object, overwriting any existing content
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), IngestError>;

    /// Streams `[start, end_inclusive]` of the object; to EOF when `end`
    /// is omitted
    async fn get_range(
        &self,
        key: &StorageKey,
        start: u64,
        end_inclusive: Option<u64>,
    ) -> Result<ByteStream, IngestError>;

    /// True when the object exists
    async fn exists(&self, key: &StorageKey) -> Result<bool, IngestError>;

    /// Size of the object in bytes
    async fn size(&self, key: &StorageKey) -> Result<u64, IngestError>;

    /// Read-modify-write append; treats a missing object as empty.
    /// Returns the object's new total size.
    async fn append_via_rewrite(
        &self,
        key: &StorageKey,
        chunk: Vec<u8>,
    ) -> Result<u64, IngestError>;

    /// Removes the object; a no-op when absent
    async fn delete(&self, key: &StorageKey) -> Result<(), IngestError>;
}

/// Reads up to `max_bytes` from the start of an object.
///
/// Convenience for header detection, which only needs the first scan
/// window of the source.
pub async fn read_prefix(
    store: &dyn ObjectStore,
    key: &StorageKey,
    max_bytes: u64,
) -> Result<Vec<u8>, IngestError> {
    if max_bytes == 0 {
        return Ok(Vec::new());
    }
    let mut stream = store.get_range(key, 0, Some(max_bytes - 1)).await?;
    let mut prefix = Vec::new();
    while let Some(chunk) = stream.next().await {
        prefix.extend_from_slice(&chunk?);
        if prefix.len() as u64 >= max_bytes {
            prefix.truncate(max_bytes as usize);
            break;
        }
    }
    Ok(prefix)
}
