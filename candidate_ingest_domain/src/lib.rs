// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Ingest Domain
//!
//! Pure business logic of the candidate ingestion pipeline: the upload job
//! aggregate and its lifecycle state machine, the candidate destination
//! record, the streaming row parser, header/delimiter detection, per-row
//! cleaning and validation, and the ports through which the application
//! layer reaches storage, persistence, and the queue.
//!
//! ## Layering
//!
//! This crate has no tokio runtime, no logging, and no database driver.
//! The parsing and cleaning services are synchronous and pure so they are
//! trivially testable; only the I/O ports (`ObjectStore`, `JobRepository`,
//! `CandidateStore`, `JobQueue`) are async traits, implemented by the
//! infrastructure layer of the `candidate-ingest` crate.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{Candidate, ChunkManifest, JobState, UploadJob};
pub use error::IngestError;
pub use repositories::{CandidateStore, InsertOptions, JobQueue, JobRepository, QueueEntry};
pub use services::{
    ByteStream, CleanOutcome, CleanerConfig, Delimiter, HeaderDetection, ObjectStore,
    ParsedRecord, ParserOptions, RowCleaner, RowParser,
};
pub use value_objects::{CandidateField, FieldMapping, JobId, StorageKey};
