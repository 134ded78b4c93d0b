// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine error types and the user-facing issue projection.

use std::time::Duration;

/// Error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid couple identity: {0}")]
    InvalidIdentity(String),

    #[error("Live subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Content generation failed: {0}")]
    GenerationFailed(String),

    #[error("Couple settings unavailable after {attempts} attempts")]
    SettingsUnavailable { attempts: u32 },

    #[error("No content available yet")]
    EmptyResult,

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether the failed operation may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::SubscriptionFailed(_)
                | SyncError::GenerationFailed(_)
                | SyncError::SettingsUnavailable { .. }
                | SyncError::Timeout(_)
                | SyncError::SubmissionFailed(_)
                | SyncError::Remote(_)
        )
    }
}

/// Non-fatal condition exposed to the UI alongside whatever content is
/// still displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIssue {
    /// Live updates are unavailable; content is served from the cache.
    SubscriptionFailed(String),
    /// Today's content could not be created; a retry is possible.
    GenerationFailed(String),
    /// Per-couple settings never became readable.
    SettingsUnavailable,
    /// Neither the cache nor the remote store has anything to show.
    EmptyResult,
    /// A response could not be submitted.
    SubmissionFailed(String),
}

impl SyncIssue {
    /// Whether the UI should offer a retry affordance for this issue.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncIssue::EmptyResult)
    }
}

impl From<&SyncError> for SyncIssue {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::SubscriptionFailed(msg) => SyncIssue::SubscriptionFailed(msg.clone()),
            SyncError::SettingsUnavailable { .. } => SyncIssue::SettingsUnavailable,
            SyncError::EmptyResult => SyncIssue::EmptyResult,
            SyncError::SubmissionFailed(msg) => SyncIssue::SubmissionFailed(msg.clone()),
            other => SyncIssue::GenerationFailed(other.to_string()),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;
