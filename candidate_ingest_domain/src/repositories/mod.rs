// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence and queue ports of the candidate ingestion domain.

pub mod candidate_store;
pub mod job_queue;
pub mod job_repository;

pub use candidate_store::{CandidateStore, InsertOptions};
pub use job_queue::{JobQueue, QueueEntry, RETRY_INITIAL_BACKOFF_MS, RETRY_MAX_ATTEMPTS};
pub use job_repository::JobRepository;
