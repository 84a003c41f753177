// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementations of the domain persistence ports.

pub mod schema;
pub mod sqlite_candidate_store;
pub mod sqlite_job_repository;

pub use schema::{ensure_schema, in_memory_pool};
pub use sqlite_candidate_store::SqliteCandidateStore;
pub use sqlite_job_repository::SqliteJobRepository;
