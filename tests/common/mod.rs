// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fakes for integration tests: a scriptable in-memory remote store,
//! counting callable procedures, a recording notification sink and a fixed
//! clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Offset, TimeZone, Utc};
use daily_sync::config::Config;
use daily_sync::db::ContentCache;
use daily_sync::error::{Result, SyncError};
use daily_sync::models::{ContentItem, Couple, CoupleKey};
use daily_sync::remote::{
    BootstrapSettingsRequest, CallOutcome, GenerateRequest, NotificationSink, RawDocument,
    RemoteProcedures, RemoteStore, SettingsUpdate, Snapshot, SubmitResponseRequest, Subscription,
};
use daily_sync::services::{Collaborators, RemoteSyncController, SyncView};
use daily_sync::time_utils::TimeSource;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Fixed test "today" in the reference zone (UTC).
#[allow(dead_code)]
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()
}

/// Midday on `today()`, away from every critical window.
#[allow(dead_code)]
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
}

/// Config with short intervals so polling paths finish quickly.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        gcp_project_id: "test-project".to_string(),
        remote_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
        bootstrap_attempts: 3,
        bootstrap_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

#[allow(dead_code)]
pub fn alice_and_bob() -> Couple {
    Couple::new("alice", "Alice", "bob", "Europe/Paris").unwrap()
}

#[allow(dead_code)]
pub fn couple_key() -> CoupleKey {
    alice_and_bob().key
}

// ─── Document Builders ───────────────────────────────────────────

/// Content document for `alice_bob`, `day_index` days into a run ending today.
#[allow(dead_code)]
pub fn content_doc(day_index: u32, date: NaiveDate, updated_minute: u32) -> Value {
    content_doc_for("alice_bob", day_index, date, updated_minute)
}

#[allow(dead_code)]
pub fn content_doc_for(couple_id: &str, day_index: u32, date: NaiveDate, updated_minute: u32) -> Value {
    json!({
        "coupleId": couple_id,
        "contentKey": format!("question.{day_index}"),
        "dayIndex": day_index,
        "scheduledDate": date.format("%Y-%m-%d").to_string(),
        "status": "active",
        "createdAt": format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
        "updatedAt": format!("{}T08:{updated_minute:02}:00Z", date.format("%Y-%m-%d")),
    })
}

#[allow(dead_code)]
pub fn response_doc(author_id: &str, author_name: &str, minute: u32) -> Value {
    json!({
        "authorId": author_id,
        "authorName": author_name,
        "text": format!("{author_name} says hello"),
        "respondedAt": format!("2026-06-10T09:{minute:02}:00Z"),
    })
}

#[allow(dead_code)]
pub fn settings_doc(start: NaiveDate, current_day_index: u32) -> Value {
    json!({
        "startDate": start.format("%Y-%m-%d").to_string(),
        "timezone": "Europe/Paris",
        "currentDayIndex": current_day_index,
    })
}

/// Parsed content item for seeding the cache.
#[allow(dead_code)]
pub fn content_item(id: &str, day_index: u32, date: NaiveDate) -> ContentItem {
    ContentItem::from_document(id, &content_doc(day_index, date, 0), &Utc.fix())
        .expect("test document should parse")
}

/// Date `days` before `today()`.
#[allow(dead_code)]
pub fn days_ago(days: i64) -> NaiveDate {
    today() - ChronoDuration::days(days)
}

// ─── Clock ───────────────────────────────────────────────────────

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

#[allow(dead_code)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ─── Remote Store ────────────────────────────────────────────────

/// In-memory remote store whose live views are fed by the test.
#[derive(Default)]
pub struct FakeStore {
    settings: Mutex<Option<Value>>,
    content_views: Mutex<HashMap<String, Vec<mpsc::Sender<Snapshot>>>>,
    response_views: Mutex<HashMap<String, Vec<mpsc::Sender<Snapshot>>>>,
    settings_views: Mutex<Vec<mpsc::Sender<Snapshot>>>,
    fail_subscriptions: AtomicBool,
    content_subscriptions: AtomicUsize,
}

#[allow(dead_code)]
impl FakeStore {
    pub fn set_settings(&self, doc: Option<Value>) {
        *self.settings.lock().unwrap() = doc;
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    pub fn content_subscriptions(&self) -> usize {
        self.content_subscriptions.load(Ordering::SeqCst)
    }

    /// Number of content views for `couple_id` whose listener is still attached.
    pub fn open_content_views(&self, couple_id: &str) -> usize {
        self.content_views
            .lock()
            .unwrap()
            .get(couple_id)
            .map_or(0, |views| views.iter().filter(|tx| !tx.is_closed()).count())
    }

    pub fn has_response_view(&self, content_id: &str) -> bool {
        self.response_views
            .lock()
            .unwrap()
            .get(content_id)
            .is_some_and(|views| views.iter().any(|tx| !tx.is_closed()))
    }

    pub async fn push_content(&self, couple_id: &str, docs: Vec<(&str, Value)>) {
        let senders = self
            .content_views
            .lock()
            .unwrap()
            .get(couple_id)
            .cloned()
            .unwrap_or_default();
        deliver(senders, Ok(raw(docs))).await;
    }

    pub async fn fail_content(&self, couple_id: &str, message: &str) {
        let senders = self
            .content_views
            .lock()
            .unwrap()
            .get(couple_id)
            .cloned()
            .unwrap_or_default();
        deliver(senders, Err(message.to_string())).await;
    }

    pub async fn push_responses(&self, content_id: &str, docs: Vec<(&str, Value)>) {
        let senders = self
            .response_views
            .lock()
            .unwrap()
            .get(content_id)
            .cloned()
            .unwrap_or_default();
        deliver(senders, Ok(raw(docs))).await;
    }

    pub async fn push_settings(&self, doc: Value) {
        self.set_settings(Some(doc.clone()));
        let senders = self.settings_views.lock().unwrap().clone();
        deliver(senders, Ok(raw(vec![("alice_bob", doc)]))).await;
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            Err(SyncError::Remote("permission denied".to_string()))
        } else {
            Ok(())
        }
    }
}

fn raw(docs: Vec<(&str, Value)>) -> Vec<RawDocument> {
    docs.into_iter()
        .map(|(id, fields)| RawDocument::new(id, fields))
        .collect()
}

async fn deliver(senders: Vec<mpsc::Sender<Snapshot>>, snapshot: std::result::Result<Vec<RawDocument>, String>) {
    for tx in senders.into_iter().filter(|tx| !tx.is_closed()) {
        let _ = tx.send(snapshot.clone().map_err(SyncError::Remote)).await;
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn get_settings(&self, _couple: &CoupleKey) -> Result<Option<RawDocument>> {
        Ok(self
            .settings
            .lock()
            .unwrap()
            .clone()
            .map(|doc| RawDocument::new("alice_bob", doc)))
    }

    async fn subscribe_content(&self, couple: &CoupleKey, _limit: usize) -> Result<Subscription> {
        self.check_available()?;
        self.content_subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.content_views
            .lock()
            .unwrap()
            .entry(couple.as_str().to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::from_channel(rx))
    }

    async fn subscribe_responses(&self, content_id: &str) -> Result<Subscription> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(16);
        self.response_views
            .lock()
            .unwrap()
            .entry(content_id.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::from_channel(rx))
    }

    async fn subscribe_settings(&self, _couple: &CoupleKey) -> Result<Subscription> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(16);
        self.settings_views.lock().unwrap().push(tx);
        Ok(Subscription::from_channel(rx))
    }
}

// ─── Remote Procedures ───────────────────────────────────────────

/// Callable procedures that count calls and reply with scripted results.
pub struct FakeProcedures {
    pub generate_calls: AtomicUsize,
    pub bootstrap_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub generate_requests: Mutex<Vec<GenerateRequest>>,
    pub submitted: Mutex<Vec<SubmitResponseRequest>>,
    pub updates: Mutex<Vec<SettingsUpdate>>,
    generate_reply: Mutex<Value>,
    bootstrap_reply: Mutex<Value>,
    submit_reply: Mutex<Value>,
    generate_delay: Mutex<Duration>,
}

impl Default for FakeProcedures {
    fn default() -> Self {
        Self {
            generate_calls: AtomicUsize::new(0),
            bootstrap_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            generate_requests: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            generate_reply: Mutex::new(json!({"success": true})),
            bootstrap_reply: Mutex::new(json!({"success": true})),
            submit_reply: Mutex::new(json!({"success": true})),
            generate_delay: Mutex::new(Duration::ZERO),
        }
    }
}

#[allow(dead_code)]
impl FakeProcedures {
    pub fn reply_to_generate(&self, reply: Value) {
        *self.generate_reply.lock().unwrap() = reply;
    }

    pub fn reply_to_bootstrap(&self, reply: Value) {
        *self.bootstrap_reply.lock().unwrap() = reply;
    }

    pub fn reply_to_submit(&self, reply: Value) {
        *self.submit_reply.lock().unwrap() = reply;
    }

    pub fn delay_generate(&self, delay: Duration) {
        *self.generate_delay.lock().unwrap() = delay;
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteProcedures for FakeProcedures {
    async fn bootstrap_settings(&self, _request: &BootstrapSettingsRequest) -> Result<CallOutcome> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CallOutcome::from_result(self.bootstrap_reply.lock().unwrap().clone()))
    }

    async fn generate_today(&self, request: &GenerateRequest) -> Result<CallOutcome> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.generate_requests.lock().unwrap().push(request.clone());

        let delay = *self.generate_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(CallOutcome::from_result(self.generate_reply.lock().unwrap().clone()))
    }

    async fn submit_response(&self, request: &SubmitResponseRequest) -> Result<CallOutcome> {
        self.submitted.lock().unwrap().push(request.clone());
        Ok(CallOutcome::from_result(self.submit_reply.lock().unwrap().clone()))
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<CallOutcome> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.updates.lock().unwrap().push(update.clone());
        Ok(CallOutcome::from_result(json!({"success": true})))
    }
}

// ─── Notifications ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Raised { identifier: String, title: String },
    Cancelled(String),
    ClearedContent(String),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn raised(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Raised { identifier, .. } => Some(identifier),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn raise(&self, identifier: &str, title: &str, _body: &str) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(SinkEvent::Raised {
            identifier: identifier.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    fn cancel(&self, identifier: &str) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Cancelled(identifier.to_string()));
        Ok(())
    }

    fn cancel_all_for_content(&self, content_id: &str) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::ClearedContent(content_id.to_string()));
        Ok(())
    }
}

// ─── Harness ─────────────────────────────────────────────────────

/// A controller wired to fakes, plus handles to every fake.
#[allow(dead_code)]
pub struct Harness {
    pub controller: RemoteSyncController,
    pub store: Arc<FakeStore>,
    pub procedures: Arc<FakeProcedures>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<FixedClock>,
    pub cache: ContentCache,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(FakeStore::default());
        let procedures = Arc::new(FakeProcedures::default());
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(FixedClock::new(noon()));
        let time: Arc<dyn TimeSource> = clock.clone();

        let cache = ContentCache::in_memory()
            .await
            .expect("Failed to open in-memory cache")
            .with_time_source(time.clone());

        let controller = RemoteSyncController::new(
            config,
            cache.clone(),
            Collaborators {
                store: store.clone(),
                procedures: procedures.clone(),
                notifications: sink.clone(),
                time,
            },
        );

        Self {
            controller,
            store,
            procedures,
            sink,
            clock,
            cache,
        }
    }

    /// Wait until the published view satisfies `done`, failing after two seconds.
    pub async fn wait_for(&self, done: impl Fn(&SyncView) -> bool) -> SyncView {
        let mut rx = self.controller.watch();
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let view = rx.borrow_and_update();
                    if done(&view) {
                        return view.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    panic!("controller dropped while waiting");
                }
            }
        })
        .await;
        waited.unwrap_or_else(|_| panic!("timed out; last view: {:?}", self.controller.view()))
    }
}

/// Poll `condition` every few milliseconds, failing after two seconds.
#[allow(dead_code)]
pub async fn wait_until(condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met within two seconds");
}
