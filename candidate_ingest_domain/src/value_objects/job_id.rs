// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Identifier
//!
//! Strongly-typed identifier for upload jobs, backed by ULID.
//!
//! ## Why ULID
//!
//! - **Time-ordered**: lexicographic order equals creation order, which gives
//!   the job history listing its natural sort for free
//! - **Collision-resistant**: 80 bits of randomness per millisecond
//! - **Readable**: 26-character Crockford base32, URL- and filename-safe
//!
//! The newtype prevents accidentally passing a storage key or a user id
//! where a job id is expected.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::IngestError;

/// Unique identifier for an upload job.
///
/// Wraps a ULID so ids are unique, sortable by creation time, and cheap to
/// copy. Serialized as the canonical 26-character string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    /// Creates a new random job ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a job ID from its canonical string form
    pub fn from_string(s: &str) -> Result<Self, IngestError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| IngestError::validation_error(format!("Invalid job id '{}': {}", s, e)))
    }

    /// Returns the creation timestamp encoded in the ID (epoch milliseconds)
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Returns the underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for JobId {
    /// Creates a new random job ID as the default
    ///
    /// A random ID rather than a nil value prevents accidental use of
    /// uninitialized IDs in production code.
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl From<JobId> for Ulid {
    fn from(id: JobId) -> Self {
        id.0
    }
}
