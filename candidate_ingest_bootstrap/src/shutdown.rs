// /////////////////////////////////////////////////////////////////////////////
// Candidate Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Graceful shutdown for the ingestion worker. A ctrl-c (or an explicit
//! call) cancels a shared token; the worker observes the token at the same
//! cooperative gate it checks for job pauses, persists progress as a
//! paused job, and exits its loop. The coordinator then waits up to a
//! grace period for that cleanup before the process is allowed to exit.
//!
//! The token is intentionally the only signal surface: a job pause and a
//! process shutdown take the identical code path through the orchestrator,
//! so shutdown can never lose more progress than one batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Default grace period for graceful shutdown (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Clone-able cancellation signal.
///
/// Tasks poll [`is_cancelled`](Self::is_cancelled) at cooperative gates or
/// await [`cancelled`](Self::cancelled) inside `select!` arms.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates an uncancelled token
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            receiver,
            sender: Arc::new(sender),
        }
    }

    /// Cancels this token and every clone of it
    pub fn cancel(&self) {
        // Send only fails with no receivers; we always hold one
        let _ = self.sender.send(true);
    }

    /// Non-blocking cancellation check
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates shutdown across the worker and auxiliary tasks.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    initiated: Arc<AtomicBool>,
    complete: Arc<tokio::sync::Notify>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            initiated: Arc::new(AtomicBool::new(false)),
            complete: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Token to hand to worker tasks
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Cancels the shared token and starts the grace window. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(grace_period = ?self.grace_period, "initiating graceful shutdown");
            self.token.cancel();
        }
    }

    /// Waits for [`complete_shutdown`](Self::complete_shutdown) or the
    /// grace period, whichever comes first.
    ///
    /// Returns `true` when cleanup finished inside the grace window.
    pub async fn wait_for_shutdown(&self) -> bool {
        if !self.is_shutting_down() {
            tracing::warn!("wait_for_shutdown called before shutdown was initiated");
            return true;
        }
        tokio::select! {
            _ = self.complete.notified() => {
                tracing::info!("shutdown completed gracefully");
                true
            }
            _ = tokio::time::sleep(self.grace_period) => {
                tracing::warn!("shutdown grace period expired");
                false
            }
        }
    }

    /// Signals that worker cleanup is done
    pub fn complete_shutdown(&self) {
        self.complete.notify_waiters();
    }

    /// Spawns a task that initiates shutdown on ctrl-c.
    ///
    /// Call once from the binary after the runtime is up.
    pub fn install_ctrl_c_handler(&self) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received");
                coordinator.initiate_shutdown();
            }
        });
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}
