// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities of the candidate ingestion domain.
//!
//! `UploadJob` is the aggregate root with the lifecycle state machine;
//! `Candidate` is the immutable destination record; `ChunkManifest` is the
//! transient per-upload assembly state.

pub mod candidate;
pub mod chunk_manifest;
pub mod upload_job;

pub use candidate::Candidate;
pub use chunk_manifest::ChunkManifest;
pub use upload_job::{JobState, UploadJob};
