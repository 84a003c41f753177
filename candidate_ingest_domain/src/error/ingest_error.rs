// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the candidate
//! ingestion domain. It categorizes failures, provides actionable error
//! messages, and distinguishes errors that can be retried from errors that
//! terminate a job.
//!
//! ## Error Categories
//!
//! ### Configuration Errors
//! - **InvalidConfiguration**: Malformed or missing configuration settings
//!   (missing bucket, bad queue settings). These refuse startup.
//! - **ValidationError**: Data validation failures (bad mapping keys, bad
//!   storage keys).
//!
//! ### Ingestion Errors
//! - **ParseError**: The row tokenizer reached an unrecoverable state
//! - **ChunkError**: Chunk assembly failures (duplicate index, bad manifest)
//! - **InvalidState**: A job lifecycle transition that the state machine
//!   forbids
//!
//! ### Infrastructure Errors
//! - **IoError**: Object store and file system failures (retried inside the
//!   adapters for transient cases)
//! - **NotFound**: A requested object or job does not exist. The chunk
//!   assembler treats a missing object as "no prior chunks"; the
//!   orchestrator treats a missing source as terminal.
//! - **DatabaseError**: Job store, candidate store, and queue failures
//! - **TimeoutError**: Batch insert or upload deadline expiry
//! - **SerializationError**: Mapping/header/payload encoding failures
//!
//! ### System Errors
//! - **Cancelled**: Cooperative cancellation observed
//! - **InternalError**: Unexpected failures (task panics, wedged state)
//! - **MetricsError**: Metrics registration and collection failures
//!
//! ## Recovery
//!
//! `is_recoverable()` marks the transient conditions (`IoError`,
//! `TimeoutError`, `DatabaseError`) that the queue's bounded retry policy
//! may redeliver. Everything else either terminates the job (`ParseError`,
//! `NotFound` on the source object) or refuses the operation outright.

use thiserror::Error;

/// Domain-specific errors for the candidate ingestion system.
///
/// Each variant carries a descriptive message. Variants are grouped by the
/// layer that produces them so callers can route errors systematically: the
/// queue retries recoverable kinds, the orchestrator turns terminal kinds
/// into a `Failed` job state, and the control API maps `InvalidState` and
/// `NotFound` to client-visible responses.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Chunk error: {0}")]
    ChunkError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

impl IngestError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Creates a new chunk assembly error
    pub fn chunk_error(msg: impl Into<String>) -> Self {
        Self::ChunkError(msg.into())
    }

    /// Creates a new invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout_error(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Checks if the error is recoverable
    ///
    /// Recoverable errors are transient conditions that the queue's retry
    /// policy may redeliver with backoff.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::TimeoutError(_) | IngestError::IoError(_) | IngestError::DatabaseError(_)
        )
    }

    /// Checks if the error indicates a missing object or record
    pub fn is_not_found(&self) -> bool {
        matches!(self, IngestError::NotFound(_))
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::InvalidConfiguration(_) => "configuration",
            IngestError::ValidationError(_) => "validation",
            IngestError::ParseError(_) => "parse",
            IngestError::ChunkError(_) => "chunk",
            IngestError::InvalidState(_) => "lifecycle",
            IngestError::IoError(_) => "io",
            IngestError::NotFound(_) => "not-found",
            IngestError::DatabaseError(_) => "database",
            IngestError::SerializationError(_) => "serialization",
            IngestError::TimeoutError(_) => "timeout",
            IngestError::Cancelled(_) => "cancellation",
            IngestError::InternalError(_) => "internal",
            IngestError::MetricsError(_) => "metrics",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IngestError::NotFound(err.to_string())
        } else {
            IngestError::IoError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::SerializationError(err.to_string())
    }
}
