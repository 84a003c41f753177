// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Candidate Ingest Bootstrap
//!
//! Entry-point concerns of the ingestion binary, kept apart from both the
//! domain and the application so they stay reusable and testable:
//!
//! - **Logger**: minimal logging surface for the pre-subscriber phase
//! - **Shutdown**: cancellation tokens, grace period coordination, ctrl-c
//!   wiring; the worker's cooperative pause gate observes these tokens
//! - **Exit codes**: sysexits-style mapping from error categories

pub mod exit_code;
pub mod logger;
pub mod shutdown;

pub use exit_code::ExitCode;
pub use logger::{BootstrapLogger, ConsoleLogger, NoOpLogger};
pub use shutdown::{CancellationToken, ShutdownCoordinator, DEFAULT_GRACE_PERIOD_SECS};
