// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision
//!
//! Supervised spawning for the worker and auxiliary tasks: every spawned
//! future's outcome is logged, panics convert into typed errors, and the
//! caller must hold the handle, so background failures are never silent.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use candidate_ingest_domain::IngestError;

/// Result type alias for application operations
pub type AppResult<T> = Result<T, IngestError>;

/// Spawns a task whose start, completion, and failure are logged.
///
/// The returned handle must be awaited through
/// [`join_supervised`] so errors and panics propagate.
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<AppResult<T>>
where
    F: std::future::Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");

    tokio::spawn(async move {
        let result = fut.await;
        match &result {
            Ok(_) => debug!(task = name, "task completed"),
            Err(e) => error!(task = name, error = %e, "task failed"),
        }
        result
    })
}

/// Joins a supervised task, converting panics and cancellations into
/// typed errors.
pub async fn join_supervised<T>(handle: JoinHandle<AppResult<T>>) -> AppResult<T> {
    match handle.await {
        Ok(task_result) => task_result,
        Err(e) if e.is_panic() => Err(IngestError::internal_error(format!("task panicked: {}", e))),
        Err(e) if e.is_cancelled() => Err(IngestError::cancelled("task was cancelled")),
        Err(e) => Err(IngestError::internal_error(format!("task join failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_propagates_value() {
        let handle = spawn_supervised("ok-task", async { Ok::<i32, IngestError>(42) });
        assert_eq!(join_supervised(handle).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let handle = spawn_supervised("err-task", async {
            Err::<(), _>(IngestError::validation_error("nope"))
        });
        assert!(join_supervised(handle).await.is_err());
    }

    #[tokio::test]
    async fn test_panic_becomes_typed_error() {
        let handle = tokio::spawn(async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok::<(), IngestError>(())
        });
        let err = join_supervised(handle).await.unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
