// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interfaces to the collaborators the engine consumes but does not own:
//! the remote document store, the callable procedures, the local
//! notification sink and the localization resolver.

use crate::error::Result;
use crate::models::CoupleKey;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An untyped remote document: its ID plus its raw field map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: Value,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Full result set delivered by a live subscription.
pub type Snapshot = Result<Vec<RawDocument>>;

/// Handle to a live subscription.
///
/// Snapshots arrive in order; `next` returns `None` once the remote side
/// closes the stream. Dropping the handle detaches the listener.
pub struct Subscription {
    rx: mpsc::Receiver<Snapshot>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a channel fed by some other party (tests, push-based SDKs).
    pub fn from_channel(rx: mpsc::Receiver<Snapshot>) -> Self {
        Self { rx, worker: None }
    }

    /// Wrap a channel fed by a background task owned by this subscription.
    pub fn with_worker(rx: mpsc::Receiver<Snapshot>, worker: JoinHandle<()>) -> Self {
        Self {
            rx,
            worker: Some(worker),
        }
    }

    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// Remote document store with live queries.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Point read of the couple's settings document.
    async fn get_settings(&self, couple: &CoupleKey) -> Result<Option<RawDocument>>;

    /// Live query over the couple's content, `dayIndex` descending, capped at `limit`.
    async fn subscribe_content(&self, couple: &CoupleKey, limit: usize) -> Result<Subscription>;

    /// Live query over a content item's nested responses, `respondedAt` ascending.
    async fn subscribe_responses(&self, content_id: &str) -> Result<Subscription>;

    /// Live view of the couple's settings document (zero or one document per snapshot).
    async fn subscribe_settings(&self, couple: &CoupleKey) -> Result<Subscription>;
}

/// Result of a callable procedure.
///
/// `success == false` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub success: bool,
    pub payload: Value,
    pub message: Option<String>,
}

impl CallOutcome {
    /// Build an outcome from a callable `result` object.
    pub fn from_result(result: Value) -> Self {
        let success = result
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let message = result
            .get("message")
            .or_else(|| result.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            success,
            payload: result,
            message,
        }
    }

    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "remote procedure reported failure".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSettingsRequest {
    pub couple_id: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub couple_id: String,
    pub user_id: String,
    pub day_index: u32,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    pub content_id: String,
    pub text: String,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub couple_id: String,
    pub current_day_index: u32,
    /// `YYYY-MM-DD` in the reference zone
    pub last_visit_date: String,
}

/// Callable remote procedures.
#[async_trait]
pub trait RemoteProcedures: Send + Sync {
    async fn bootstrap_settings(&self, request: &BootstrapSettingsRequest) -> Result<CallOutcome>;

    async fn generate_today(&self, request: &GenerateRequest) -> Result<CallOutcome>;

    async fn submit_response(&self, request: &SubmitResponseRequest) -> Result<CallOutcome>;

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<CallOutcome>;
}

/// Local (on-device) notification sink.
pub trait NotificationSink: Send + Sync {
    fn raise(&self, identifier: &str, title: &str, body: &str) -> anyhow::Result<()>;

    fn cancel(&self, identifier: &str) -> anyhow::Result<()>;

    fn cancel_all_for_content(&self, content_id: &str) -> anyhow::Result<()>;
}

/// Resolves opaque content keys to display text. Used by UI code only.
pub trait Localizer: Send + Sync {
    fn resolve(&self, content_key: &str) -> String;
}
