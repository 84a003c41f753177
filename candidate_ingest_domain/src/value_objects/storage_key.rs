// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Storage Key
//!
//! POSIX-style object store key for assembled upload objects.
//!
//! Upload keys follow the deterministic scheme
//! `uploads/{user_id}/{stamp}_{sanitized_file_name}` where `stamp` is the
//! epoch-millisecond timestamp captured once when the upload's manifest is
//! created. Sanitization replaces every character outside `[A-Za-z0-9.-]`
//! with `_`. It is applied to the file name, and also to the user id:
//! both land in key segments, and a user id shaped like an email address
//! or carrying a slash must not be able to escape the key space any more
//! than a file name can.
//!
//! A `StorageKey` is also constructible from a raw string (for keys handed
//! back by clients on the headers/process calls); raw construction still
//! rejects empty keys and path traversal segments.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::IngestError;

/// Key of an object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Creates a key from a raw string, validating basic shape.
    ///
    /// Rejects empty keys, absolute paths, and `..` segments. Everything
    /// else is accepted verbatim so existing stored keys keep resolving.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IngestError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IngestError::validation_error("Storage key must not be empty"));
        }
        if raw.starts_with('/') {
            return Err(IngestError::validation_error(format!(
                "Storage key must be relative: {}",
                raw
            )));
        }
        if raw.split('/').any(|segment| segment == "..") {
            return Err(IngestError::validation_error(format!(
                "Storage key must not contain parent segments: {}",
                raw
            )));
        }
        Ok(Self(raw))
    }

    /// Builds the deterministic key for an assembled upload object.
    ///
    /// `stamp_ms` is captured once per logical upload so every chunk of the
    /// same upload appends to the same object. Both the user id and the
    /// file name are sanitized; each occupies a key segment and neither is
    /// trusted to be path-safe.
    pub fn for_upload(user_id: &str, stamp_ms: u64, file_name: &str) -> Self {
        Self(format!(
            "uploads/{}/{}_{}",
            sanitize_component(user_id),
            stamp_ms,
            sanitize_component(file_name)
        ))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StorageKey {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Replaces any character outside `[A-Za-z0-9.-]` with `_`.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
