// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Object Store
//!
//! Object store adapter backed by a local directory tree. Objects live at
//! `{root}/{bucket}/{key}`; keys are POSIX-style and may contain slashes,
//! which become subdirectories.
//!
//! ## Semantics
//!
//! - `put` writes to a temp file in the target directory and renames it
//!   into place, so readers never observe a half-written object
//! - `get_range` seeks and streams fixed-size chunks; dropping the stream
//!   stops the read immediately
//! - `append_via_rewrite` is the contract's read-modify-write append:
//!   download (empty when absent), concatenate, re-upload
//! - transient I/O failures are retried with bounded exponential backoff;
//!   `NotFound` is never retried because it is an answer, not a failure
//!
//! The same directory layout doubles as the local development story: point
//! the root at a scratch directory and the whole pipeline runs without any
//! cloud credentials.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use candidate_ingest_domain::services::object_store::{ByteStream, ObjectStore};
use candidate_ingest_domain::{IngestError, StorageKey};

/// Bytes per streamed read chunk
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Bounded retry for transient failures
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

/// Object store over a local directory tree.
pub struct FsObjectStore {
    bucket_root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at `{root}/{bucket}`.
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Result<Self, IngestError> {
        if bucket.is_empty() {
            return Err(IngestError::invalid_config(
                "Object store bucket must not be empty",
            ));
        }
        Ok(Self {
            bucket_root: root.as_ref().join(bucket),
        })
    }

    fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.bucket_root.join(key.as_str())
    }

    /// Runs `operation` with bounded exponential backoff on recoverable
    /// errors.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, IngestError>>,
    {
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_recoverable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        operation = what,
                        attempt,
                        error = %err,
                        "transient object store failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn read_whole(&self, key: &StorageKey) -> Result<Vec<u8>, IngestError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IngestError::not_found(
                format!("Object not found: {}", key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, key: &StorageKey, bytes: &[u8]) -> Result<(), IngestError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = path.with_extension(format!("tmp.{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), IngestError> {
        debug!(key = %key, size = bytes.len(), content_type, "put object");
        let data = &bytes;
        self.with_retry("put", move || async move { self.write_atomic(key, data).await })
            .await
    }

    async fn get_range(
        &self,
        key: &StorageKey,
        start: u64,
        end_inclusive: Option<u64>,
    ) -> Result<ByteStream, IngestError> {
        let path = self.path_for(key);
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::not_found(format!("Object not found: {}", key)));
            }
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(start)).await?;

        let mut remaining: Option<u64> = end_inclusive.map(|end| end.saturating_sub(start) + 1);
        let stream = try_stream! {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            loop {
                let want = match remaining {
                    Some(0) => break,
                    Some(n) => (n as usize).min(buf.len()),
                    None => buf.len(),
                };
                let read = file.read(&mut buf[..want]).await?;
                if read == 0 {
                    break;
                }
                if let Some(n) = remaining.as_mut() {
                    *n -= read as u64;
                }
                yield buf[..read].to_vec();
            }
        };
        Ok(Box::pin(stream))
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, IngestError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, key: &StorageKey) -> Result<u64, IngestError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IngestError::not_found(
                format!("Object not found: {}", key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_via_rewrite(
        &self,
        key: &StorageKey,
        chunk: Vec<u8>,
    ) -> Result<u64, IngestError> {
        let data = &chunk;
        self.with_retry("append_via_rewrite", move || async move {
            let mut existing = match self.read_whole(key).await {
                Ok(bytes) => bytes,
                // No prior chunks yet
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            existing.extend_from_slice(data);
            let new_len = existing.len() as u64;
            self.write_atomic(key, &existing).await?;
            Ok(new_len)
        })
        .await
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), IngestError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
