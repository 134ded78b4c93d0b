// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed remote document store.
//!
//! Provides:
//! - Point reads of couple settings
//! - Live views of a couple's daily content, a content item's nested
//!   responses, and the couple's settings document
//!
//! Live views are change-detecting snapshot polls: each tick re-runs the
//! query and forwards the full result set only when it differs from the
//! last one delivered. A query error is forwarded once and ends the
//! subscription, matching how a native listener is torn down on error.

use crate::db::collections;
use crate::error::{Result, SyncError};
use crate::models::CoupleKey;
use crate::remote::{RawDocument, RemoteStore, Snapshot, Subscription};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Snapshots buffered per subscription before the poller waits on the consumer.
const SNAPSHOT_BUFFER: usize = 4;

/// Firestore remote store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
    poll_interval: Duration,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, poll_interval: Duration) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, poll_interval).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| SyncError::Remote(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            poll_interval,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, poll_interval: Duration) -> Result<Self> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            SyncError::Remote(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            poll_interval,
        })
    }

    /// Create an offline store for testing.
    ///
    /// Every operation returns an error, which the engine treats like a
    /// device with no network.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            poll_interval: Duration::from_secs(5),
        }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| SyncError::Remote("Firestore not connected (offline mode)".to_string()))
    }

    // ─── Queries ──────────────────────────────────────────────────

    async fn query_content(
        client: &firestore::FirestoreDb,
        couple_id: String,
        limit: u32,
    ) -> Result<Vec<RawDocument>> {
        let docs = client
            .fluent()
            .select()
            .from(collections::DAILY_CONTENT)
            .filter(move |q| q.for_all([q.field("coupleId").eq(couple_id.clone())]))
            .order_by([("dayIndex", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .query()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        Ok(docs.iter().filter_map(to_raw_document).collect())
    }

    async fn query_responses(
        client: &firestore::FirestoreDb,
        content_id: &str,
    ) -> Result<Vec<RawDocument>> {
        let parent_path = client
            .parent_path(collections::DAILY_CONTENT, content_id)
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        let docs = client
            .fluent()
            .select()
            .from(collections::RESPONSES)
            .parent(&parent_path)
            .order_by([("respondedAt", firestore::FirestoreQueryDirection::Ascending)])
            .query()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        Ok(docs.iter().filter_map(to_raw_document).collect())
    }

    async fn read_settings(
        client: &firestore::FirestoreDb,
        couple_id: &str,
    ) -> Result<Option<RawDocument>> {
        let doc = client
            .fluent()
            .select()
            .by_id_in(collections::COUPLE_SETTINGS)
            .one(couple_id)
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        Ok(doc.as_ref().and_then(to_raw_document))
    }

    // ─── Live Views ───────────────────────────────────────────────

    /// Spawn a poller that re-runs `fetch` every interval and forwards changed results.
    fn spawn_poller<F, Fut>(&self, label: &'static str, fetch: F) -> Result<Subscription>
    where
        F: Fn(firestore::FirestoreDb) -> Fut + Send + 'static,
        Fut: Future<Output = Snapshot> + Send + 'static,
    {
        let client = self.get_client()?.clone();
        let interval = self.poll_interval;
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);

        let worker = tokio::spawn(async move {
            let mut last: Option<Vec<RawDocument>> = None;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let snapshot = fetch(client.clone()).await;

                let failed = match &snapshot {
                    Ok(docs) if last.as_ref() == Some(docs) => continue,
                    Ok(docs) => {
                        last = Some(docs.clone());
                        false
                    }
                    Err(e) => {
                        tracing::warn!(view = label, error = %e, "Live view query failed");
                        true
                    }
                };

                if tx.send(snapshot).await.is_err() || failed {
                    break;
                }
            }
            tracing::debug!(view = label, "Live view stopped");
        });

        Ok(Subscription::with_worker(rx, worker))
    }
}

#[async_trait]
impl RemoteStore for FirestoreStore {
    async fn get_settings(&self, couple: &CoupleKey) -> Result<Option<RawDocument>> {
        Self::read_settings(self.get_client()?, couple.as_str()).await
    }

    async fn subscribe_content(&self, couple: &CoupleKey, limit: usize) -> Result<Subscription> {
        let couple_id = couple.as_str().to_string();
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        self.spawn_poller("content", move |client| {
            let couple_id = couple_id.clone();
            async move { Self::query_content(&client, couple_id, limit).await }
        })
    }

    async fn subscribe_responses(&self, content_id: &str) -> Result<Subscription> {
        let content_id = content_id.to_string();
        self.spawn_poller("responses", move |client| {
            let content_id = content_id.clone();
            async move { Self::query_responses(&client, &content_id).await }
        })
    }

    async fn subscribe_settings(&self, couple: &CoupleKey) -> Result<Subscription> {
        let couple_id = couple.as_str().to_string();
        self.spawn_poller("settings", move |client| {
            let couple_id = couple_id.clone();
            async move {
                Self::read_settings(&client, &couple_id)
                    .await
                    .map(|doc| doc.into_iter().collect())
            }
        })
    }
}

/// Convert a Firestore document into an untyped record.
///
/// Documents whose fields cannot be represented are skipped.
fn to_raw_document(doc: &firestore::FirestoreDocument) -> Option<RawDocument> {
    let id = doc.name.rsplit('/').next()?.to_string();
    match firestore::FirestoreDb::deserialize_doc_to::<serde_json::Value>(doc) {
        Ok(fields) => Some(RawDocument { id, fields }),
        Err(e) => {
            tracing::warn!(document = %doc.name, error = %e, "Skipping undecodable document");
            None
        }
    }
}
