// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Object Store
//!
//! HashMap-backed object store for tests and in-process demos. Implements
//! the full port contract, including range semantics and `NotFound`, so
//! integration tests exercise the same code paths the filesystem adapter
//! does. Reads are chunked into small slices to keep streaming consumers
//! honest about partial reads.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use candidate_ingest_domain::services::object_store::{ByteStream, ObjectStore};
use candidate_ingest_domain::{IngestError, StorageKey};

/// Bytes per emitted stream chunk; deliberately small so record boundaries
/// land mid-chunk in tests
const CHUNK_BYTES: usize = 8 * 1024;

/// Object store held entirely in memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct content access for assertions
    pub fn raw(&self, key: &StorageKey) -> Option<Vec<u8>> {
        self.objects.read().get(key.as_str()).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), IngestError> {
        self.objects.write().insert(key.as_str().to_string(), bytes);
        Ok(())
    }

    async fn get_range(
        &self,
        key: &StorageKey,
        start: u64,
        end_inclusive: Option<u64>,
    ) -> Result<ByteStream, IngestError> {
        let bytes = self
            .raw(key)
            .ok_or_else(|| IngestError::not_found(format!("Object not found: {}", key)))?;

        let len = bytes.len() as u64;
        let start = start.min(len);
        let end = end_inclusive.map_or(len, |e| (e + 1).min(len)).max(start);
        let window = bytes[start as usize..end as usize].to_vec();

        let chunks: Vec<Result<Vec<u8>, IngestError>> = window
            .chunks(CHUNK_BYTES)
            .map(|c| Ok(c.to_vec()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, IngestError> {
        Ok(self.objects.read().contains_key(key.as_str()))
    }

    async fn size(&self, key: &StorageKey) -> Result<u64, IngestError> {
        self.objects
            .read()
            .get(key.as_str())
            .map(|b| b.len() as u64)
            .ok_or_else(|| IngestError::not_found(format!("Object not found: {}", key)))
    }

    async fn append_via_rewrite(
        &self,
        key: &StorageKey,
        chunk: Vec<u8>,
    ) -> Result<u64, IngestError> {
        let mut objects = self.objects.write();
        let entry = objects.entry(key.as_str().to_string()).or_default();
        entry.extend_from_slice(&chunk);
        Ok(entry.len() as u64)
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), IngestError> {
        self.objects.write().remove(key.as_str());
        Ok(())
    }
}
