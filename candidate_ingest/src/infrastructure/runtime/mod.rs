// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Worker runtime: the durable queue, the consumer loop, and supervised
//! task helpers.

pub mod sqlite_job_queue;
pub mod supervisor;
pub mod worker;

pub use sqlite_job_queue::{QueueConfig, SqliteJobQueue};
pub use supervisor::{join_supervised, spawn_supervised, AppResult};
pub use worker::Worker;
