// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - the synchronization engine.

pub mod callable;
pub mod day_clock;
pub mod generation;
pub mod notifications;
pub mod optimization;
pub mod responses;
pub mod sync;

pub use callable::CallableClient;
pub use day_clock::DayClock;
pub use generation::{GenerationCoordinator, GenerationOutcome};
pub use notifications::{notification_id, NotificationGate};
pub use optimization::OptimizationPolicy;
pub use responses::{ResponseTracker, ResponseUpdate};
pub use sync::{Collaborators, RemoteSyncController, SyncPhase, SyncView};

use crate::error::{Result, SyncError};
use std::future::Future;
use std::time::Duration;

/// Bound a remote call so it fails with a retryable error instead of hanging.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SyncError::Timeout(limit))?
}
