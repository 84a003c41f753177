// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Store Interface
//!
//! Port for the destination datastore. The core needs exactly one write
//! operation: an unordered batch insert whose semantics are "attempt all
//! records, never fail the call on a per-record error, return without
//! per-record success counts". The orchestrator treats a successful call
//! as the whole batch attempted and counts accordingly; duplicates under
//! retry are acceptable by contract.

use async_trait::async_trait;

use crate::entities::Candidate;
use crate::IngestError;

/// Options of a batch insert.
#[derive(Debug, Clone, Copy)]
pub struct InsertOptions {
    /// Ordered inserts stop at the first per-record error; the ingestion
    /// core always runs unordered
    pub ordered: bool,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self { ordered: false }
    }
}

/// Destination datastore port.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Attempts to insert every record of the batch.
    ///
    /// With `ordered: false` a per-record failure (duplicate, malformed)
    /// must not fail the call; only a failure of the batch as a whole
    /// (connectivity, transaction) is an error.
    async fn insert_many(
        &self,
        records: &[Candidate],
        options: InsertOptions,
    ) -> Result<(), IngestError>;

    /// Counts stored candidates; used by status reporting and tests
    async fn count(&self) -> Result<u64, IngestError>;
}
