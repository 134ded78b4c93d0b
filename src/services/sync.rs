// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote sync controller: the engine's state machine.
//!
//! ```text
//! Idle → CacheLoaded → LiveAttached ⇄ Reconciling
//!                          ↓
//!                       Degraded (cache-only)
//! ```
//!
//! `configure` paints from the cache, then attaches live views of the
//! couple's content and settings. Every content snapshot is reconciled into
//! the cache and may swap the current item, which in turn moves the
//! response subscription. Subscription failures fall back to the cache.
//!
//! Background tasks hold only a weak reference to the controller; dropping
//! the last handle detaches every subscription.

use crate::config::Config;
use crate::db::{ContentCache, FirestoreStore};
use crate::error::{Result, SyncError, SyncIssue};
use crate::models::content::select_current;
use crate::models::{ContentItem, ContentSettings, Couple, CoupleKey};
use crate::remote::{
    NotificationSink, RawDocument, RemoteProcedures, RemoteStore, SubmitResponseRequest,
    Subscription,
};
use crate::services::{
    with_timeout, CallableClient, DayClock, GenerationCoordinator, GenerationOutcome,
    NotificationGate, OptimizationPolicy, ResponseTracker,
};
use crate::time_utils::{SystemClock, TimeSource};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Not configured for any couple
    #[default]
    Idle,
    /// Showing cached content; live view not attached yet
    CacheLoaded,
    /// Live view attached and in sync
    LiveAttached,
    /// Applying a live snapshot
    Reconciling,
    /// Live view unavailable or empty; serving the cache read-only
    Degraded,
}

/// Observable controller state for UI binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncView {
    pub couple: Option<CoupleKey>,
    pub phase: SyncPhase,
    /// The item to display ("today's" content)
    pub current: Option<ContentItem>,
    pub settings: Option<ContentSettings>,
    /// Most recent non-fatal problem, if any
    pub issue: Option<SyncIssue>,
    /// Whether a generation request is outstanding
    pub generating: bool,
}

/// External collaborators the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RemoteStore>,
    pub procedures: Arc<dyn RemoteProcedures>,
    pub notifications: Arc<dyn NotificationSink>,
    pub time: Arc<dyn TimeSource>,
}

#[derive(Default)]
struct ControllerState {
    couple: Option<Couple>,
    /// Bumped on every (re)configure; tasks from older epochs are ignored
    epoch: u64,
    phase: SyncPhase,
    current: Option<ContentItem>,
    settings: Option<ContentSettings>,
    issue: Option<SyncIssue>,
    generating: bool,
    tracker: ResponseTracker,
    /// Whether the nested response stream has reported for `current`
    nested_responses_seen: bool,
    content_task: Option<JoinHandle<()>>,
    settings_task: Option<JoinHandle<()>>,
    response_task: Option<JoinHandle<()>>,
    generation_task: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn abort_tasks(&mut self) {
        for task in [
            self.content_task.take(),
            self.settings_task.take(),
            self.response_task.take(),
            self.generation_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        self.tracker.detach();
    }

    fn view(&self) -> SyncView {
        SyncView {
            couple: self.couple.as_ref().map(|c| c.key.clone()),
            phase: self.phase,
            current: self.current.clone(),
            settings: self.settings.clone(),
            issue: self.issue.clone(),
            generating: self.generating,
        }
    }

    fn live_attached(&self) -> bool {
        self.content_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

struct Inner {
    config: Config,
    store: Arc<dyn RemoteStore>,
    procedures: Arc<dyn RemoteProcedures>,
    time: Arc<dyn TimeSource>,
    cache: ContentCache,
    clock: DayClock,
    generation: GenerationCoordinator,
    gate: NotificationGate,
    policy: OptimizationPolicy,
    state: Mutex<ControllerState>,
    view: watch::Sender<SyncView>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state.get_mut().abort_tasks();
    }
}

/// Daily content synchronization engine for one device.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct RemoteSyncController {
    inner: Arc<Inner>,
}

impl RemoteSyncController {
    pub fn new(config: Config, cache: ContentCache, collaborators: Collaborators) -> Self {
        let clock = DayClock::new(config.reference_offset);
        let generation = GenerationCoordinator::new(
            collaborators.store.clone(),
            collaborators.procedures.clone(),
            cache.clone(),
            collaborators.time.clone(),
            &config,
        );
        let (view, _) = watch::channel(SyncView::default());

        Self {
            inner: Arc::new(Inner {
                policy: OptimizationPolicy::new(clock, &config),
                gate: NotificationGate::new(collaborators.notifications),
                store: collaborators.store,
                procedures: collaborators.procedures,
                time: collaborators.time,
                cache,
                clock,
                generation,
                state: Mutex::new(ControllerState::default()),
                view,
                config,
            }),
        }
    }

    /// Build a production controller: Firestore store, callable functions
    /// and an on-disk cache, all taken from `config`.
    pub async fn connect(
        config: Config,
        notifications: Arc<dyn NotificationSink>,
        id_token: Option<String>,
    ) -> Result<Self> {
        let store = FirestoreStore::new(&config.gcp_project_id, config.poll_interval).await?;
        let mut procedures = CallableClient::new(&config.functions_base_url, config.remote_timeout)?;
        if let Some(token) = id_token {
            procedures = procedures.with_id_token(token);
        }
        let cache = ContentCache::connect(&config.cache_url).await?;

        Ok(Self::new(
            config,
            cache,
            Collaborators {
                store: Arc::new(store),
                procedures: Arc::new(procedures),
                notifications,
                time: Arc::new(SystemClock),
            },
        ))
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ─── Observation ─────────────────────────────────────────────

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<SyncView> {
        self.inner.view.subscribe()
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> SyncView {
        self.inner.view.borrow().clone()
    }

    /// The item currently displayed, if any.
    pub fn current(&self) -> Option<ContentItem> {
        self.inner.view.borrow().current.clone()
    }

    /// Cached history for the configured couple, most recent first.
    pub async fn history(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let couple = {
            let state = self.inner.state.lock().await;
            state.couple.as_ref().map(|c| c.key.clone())
        };
        match couple {
            Some(key) => self.inner.cache.get_recent(&key, limit).await,
            None => Ok(Vec::new()),
        }
    }

    fn publish(&self, state: &ControllerState) {
        let next = state.view();
        self.inner.view.send_if_modified(|view| {
            if *view == next {
                false
            } else {
                *view = next;
                true
            }
        });
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Start serving content for `couple`.
    ///
    /// Re-configuring for the couple already being served is a no-op.
    /// Switching couples detaches every previous subscription before
    /// anything new is attached.
    pub async fn configure(&self, couple: Couple) -> Result<()> {
        let mut state = self.inner.state.lock().await;

        if state.phase != SyncPhase::Idle
            && state.couple.as_ref().is_some_and(|c| c.key == couple.key)
        {
            tracing::debug!(couple = %couple.key, "Already configured");
            return Ok(());
        }

        state.abort_tasks();
        if let Some(previous) = &state.couple {
            tracing::info!(from = %previous.key, to = %couple.key, "Switching couple");
        }
        let epoch = state.epoch + 1;
        *state = ControllerState {
            couple: Some(couple.clone()),
            epoch,
            ..ControllerState::default()
        };

        // Cache-first paint while the live view connects.
        match self
            .inner
            .cache
            .get_recent(&couple.key, self.inner.config.cache_first_limit)
            .await
        {
            Ok(items) => {
                if let Some(latest) = items.into_iter().next() {
                    tracing::info!(
                        couple = %couple.key,
                        content_id = %latest.id,
                        day_index = latest.day_index,
                        "Displaying cached content"
                    );
                    state.current = Some(latest);
                    state.phase = SyncPhase::CacheLoaded;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Cache read failed during configure"),
        }
        self.publish(&state);

        if let Some(content_id) = state.current.as_ref().map(|c| c.id.clone()) {
            self.attach_responses(&mut state, &content_id).await;
        }
        self.attach_live(&mut state).await;
        self.publish(&state);
        Ok(())
    }

    /// Detach every subscription and return to `Idle`.
    pub async fn detach(&self) {
        let mut state = self.inner.state.lock().await;
        state.abort_tasks();
        if let Some(couple) = &state.couple {
            tracing::info!(couple = %couple.key, "Detached");
        }
        let epoch = state.epoch + 1;
        *state = ControllerState {
            epoch,
            ..ControllerState::default()
        };
        self.publish(&state);
    }

    /// Tear down after the couple unpairs: detach, withdraw notifications
    /// and drop the couple's cached content.
    pub async fn unpair(&self) -> Result<()> {
        let (couple, current) = {
            let state = self.inner.state.lock().await;
            (state.couple.clone(), state.current.clone())
        };
        self.detach().await;

        if let Some(item) = current {
            self.inner.gate.clear_content(&item.id);
        }
        if let Some(couple) = couple {
            self.inner.cache.clear(&couple.key).await?;
        }
        Ok(())
    }

    /// Re-check remote state if the optimization policy says it is worth it.
    ///
    /// Returns whether the remote side was consulted.
    pub async fn refresh(&self) -> Result<bool> {
        let mut state = self.inner.state.lock().await;
        let Some(couple) = state.couple.clone() else {
            return Ok(false);
        };

        let now = self.inner.time.now();
        let today_entry = match self
            .inner
            .cache
            .entry_for_date(&couple.key, self.inner.clock.today(now))
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed during refresh");
                None
            }
        };

        if !self
            .inner
            .policy
            .should_consult_remote(today_entry.as_ref(), now)
        {
            tracing::debug!(couple = %couple.key, "Cache is current; skipping remote check");
            return Ok(false);
        }

        if state.phase == SyncPhase::Degraded || !state.live_attached() {
            self.attach_live(&mut state).await;
        }
        self.maybe_generate(&mut state);
        self.publish(&state);
        Ok(true)
    }

    // ─── User Actions ────────────────────────────────────────────

    /// Submit this user's response to the current item.
    ///
    /// The response appears through the live response stream once the
    /// server has stored it.
    pub async fn submit_response(&self, text: &str) -> Result<()> {
        let (content_id, author_name) = {
            let state = self.inner.state.lock().await;
            match (&state.current, &state.couple) {
                (Some(item), Some(couple)) => (item.id.clone(), couple.self_name.clone()),
                _ => return Err(SyncError::EmptyResult),
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::SubmissionFailed("response text is empty".to_string()));
        }

        let request = SubmitResponseRequest {
            content_id: content_id.clone(),
            text: text.to_string(),
            author_name,
        };

        let result = with_timeout(
            self.inner.config.remote_timeout,
            self.inner.procedures.submit_response(&request),
        )
        .await
        .map_err(|e| match e {
            SyncError::Timeout(_) => e,
            other => SyncError::SubmissionFailed(other.to_string()),
        })
        .and_then(|outcome| {
            if outcome.success {
                Ok(())
            } else {
                Err(SyncError::SubmissionFailed(outcome.failure_message()))
            }
        });

        match &result {
            Ok(()) => tracing::info!(content_id = %content_id, "Response submitted"),
            Err(e) => {
                tracing::warn!(content_id = %content_id, error = %e, "Response submission failed");
                let mut state = self.inner.state.lock().await;
                state.issue = Some(SyncIssue::from(e));
                self.publish(&state);
            }
        }
        result
    }

    /// Mark the partner's responses on the current item as read.
    ///
    /// Returns the number of responses newly marked.
    pub async fn mark_responses_read(&self) -> Result<usize> {
        let mut state = self.inner.state.lock().await;
        let Some(self_id) = state.couple.as_ref().map(|c| c.self_user_id.clone()) else {
            return Ok(0);
        };
        let Some(item) = state.current.as_mut() else {
            return Ok(0);
        };

        let mut marked = 0;
        for response in item
            .responses
            .iter_mut()
            .filter(|r| r.author_id != self_id && !r.is_read)
        {
            response.is_read = true;
            marked += 1;
        }
        if marked == 0 {
            return Ok(0);
        }

        let item = item.clone();
        self.inner.cache.put(&item).await?;
        self.inner.gate.clear_content(&item.id);
        self.publish(&state);
        Ok(marked)
    }

    // ─── Live Views ──────────────────────────────────────────────

    /// (Re)attach the settings and content subscriptions.
    async fn attach_live(&self, state: &mut ControllerState) {
        let Some(couple) = state.couple.clone() else {
            return;
        };
        let timeout = self.inner.config.remote_timeout;
        let weak = Arc::downgrade(&self.inner);

        if let Some(task) = state.settings_task.take() {
            task.abort();
        }
        match with_timeout(timeout, self.inner.store.subscribe_settings(&couple.key)).await {
            Ok(sub) => {
                state.settings_task = Some(tokio::spawn(run_settings(weak.clone(), state.epoch, sub)));
            }
            Err(e) => tracing::warn!(couple = %couple.key, error = %e, "Settings subscription failed"),
        }

        if let Some(task) = state.content_task.take() {
            task.abort();
        }
        match with_timeout(
            timeout,
            self.inner
                .store
                .subscribe_content(&couple.key, self.inner.config.live_window),
        )
        .await
        {
            Ok(sub) => {
                tracing::info!(couple = %couple.key, "Live content view attached");
                state.content_task = Some(tokio::spawn(run_content(weak, state.epoch, sub)));
                state.phase = SyncPhase::LiveAttached;
            }
            Err(e) => {
                tracing::warn!(couple = %couple.key, error = %e, "Content subscription failed");
                self.fall_back_to_cache(state, SyncIssue::SubscriptionFailed(e.to_string()))
                    .await;
                self.maybe_generate(state);
            }
        }
    }

    /// Move the response subscription to `content_id`.
    async fn attach_responses(&self, state: &mut ControllerState, content_id: &str) {
        if let Some(task) = state.response_task.take() {
            task.abort();
        }
        state.tracker.attach(content_id);
        state.nested_responses_seen = false;

        match with_timeout(
            self.inner.config.remote_timeout,
            self.inner.store.subscribe_responses(content_id),
        )
        .await
        {
            Ok(sub) => {
                state.response_task = Some(tokio::spawn(run_responses(
                    Arc::downgrade(&self.inner),
                    state.epoch,
                    content_id.to_string(),
                    sub,
                )));
            }
            Err(e) => tracing::warn!(
                content_id,
                error = %e,
                "Response subscription failed; keeping cached responses"
            ),
        }
    }

    // ─── Reconciliation ──────────────────────────────────────────

    async fn reconcile(&self, epoch: u64, docs: Vec<RawDocument>) {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        let Some(couple) = state.couple.clone() else {
            return;
        };

        let reference = *self.inner.clock.reference();
        let mut items: Vec<ContentItem> = docs
            .iter()
            .filter_map(|doc| ContentItem::from_document(&doc.id, &doc.fields, &reference))
            .filter(|item| item.couple_id == couple.key.as_str())
            .collect();
        if items.len() < docs.len() {
            tracing::warn!(
                couple = %couple.key,
                dropped = docs.len() - items.len(),
                "Dropped malformed content documents"
            );
        }

        if items.is_empty() {
            tracing::info!(couple = %couple.key, "Live content view is empty");
            self.fall_back_to_cache(&mut state, SyncIssue::EmptyResult).await;
            self.maybe_generate(&mut state);
            self.publish(&state);
            return;
        }

        state.phase = SyncPhase::Reconciling;
        self.publish(&state);

        for item in items.iter_mut() {
            self.carry_known_responses(&state, item).await;
            if let Err(e) = self.inner.cache.put(item).await {
                tracing::warn!(content_id = %item.id, error = %e, "Failed to cache content");
            }
        }

        // The displayed item competes even when the window does not carry it
        // yet, e.g. a freshly generated item the view has not echoed back.
        let displayed = state
            .current
            .as_ref()
            .filter(|c| c.couple_id == couple.key.as_str() && !items.iter().any(|i| i.id == c.id));
        let latest = select_current(&items)
            .filter(|l| displayed.map_or(true, |d| l.recency_cmp(d).is_gt()))
            .cloned();
        if let Some(latest) = latest {
            self.set_current(&mut state, latest).await;
        }
        state.phase = SyncPhase::LiveAttached;
        if matches!(
            state.issue,
            Some(SyncIssue::SubscriptionFailed(_)) | Some(SyncIssue::EmptyResult)
        ) {
            state.issue = None;
        }

        self.maybe_generate(&mut state);
        self.publish(&state);
    }

    /// Keep responses the live content document does not carry.
    ///
    /// Responses are append-only, so the larger known set is the more
    /// complete one; once the nested stream has reported, it wins outright.
    async fn carry_known_responses(&self, state: &ControllerState, item: &mut ContentItem) {
        if let Some(current) = state.current.as_ref().filter(|c| c.id == item.id) {
            if state.nested_responses_seen || current.responses.len() >= item.responses.len() {
                item.responses = current.responses.clone();
            }
            return;
        }

        match self.inner.cache.get(&item.id).await {
            Ok(Some(cached)) if cached.responses.len() >= item.responses.len() => {
                item.responses = cached.responses;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(content_id = %item.id, error = %e, "Cache lookup failed"),
        }
    }

    /// Make `latest` the displayed item. Same ID updates in place; a new ID
    /// also moves the response subscription.
    async fn set_current(&self, state: &mut ControllerState, latest: ContentItem) {
        let same_item = state.current.as_ref().is_some_and(|c| c.id == latest.id);
        if same_item {
            if state.current.as_ref() != Some(&latest) {
                state.current = Some(latest);
            }
            return;
        }

        tracing::info!(
            content_id = %latest.id,
            day_index = latest.day_index,
            "Current content changed"
        );
        let content_id = latest.id.clone();
        state.current = Some(latest);
        self.attach_responses(state, &content_id).await;
    }

    async fn fall_back_to_cache(&self, state: &mut ControllerState, issue: SyncIssue) {
        state.phase = SyncPhase::Degraded;

        if state.current.is_none() {
            if let Some(couple) = &state.couple {
                match self
                    .inner
                    .cache
                    .get_recent(&couple.key, self.inner.config.cache_first_limit)
                    .await
                {
                    Ok(items) => state.current = items.into_iter().next(),
                    Err(e) => tracing::warn!(error = %e, "Cache read failed during fallback"),
                }
            }
        }

        state.issue = if state.current.is_none() {
            Some(SyncIssue::EmptyResult)
        } else {
            match issue {
                SyncIssue::EmptyResult => state.issue.take(),
                other => Some(other),
            }
        };
    }

    async fn on_content_error(&self, epoch: u64, error: SyncError) {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        tracing::warn!(error = %error, "Live content view failed; serving cache");
        // The failing task is the caller; let it finish on its own.
        state.content_task = None;
        self.fall_back_to_cache(&mut state, SyncIssue::SubscriptionFailed(error.to_string()))
            .await;
        self.maybe_generate(&mut state);
        self.publish(&state);
    }

    async fn apply_settings(&self, epoch: u64, docs: Vec<RawDocument>) {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            return;
        }

        let settings = docs
            .first()
            .and_then(|doc| ContentSettings::from_document(&doc.fields, self.inner.clock.reference()));
        if settings.is_none() && !docs.is_empty() {
            tracing::warn!("Ignoring malformed settings document");
            return;
        }
        if state.settings == settings {
            return;
        }

        state.settings = settings;
        self.maybe_generate(&mut state);
        self.publish(&state);
    }

    async fn apply_responses(&self, epoch: u64, content_id: &str, docs: Vec<RawDocument>) {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        let Some(update) = state.tracker.apply_snapshot(content_id, &docs) else {
            return;
        };
        let Some(self_id) = state.couple.as_ref().map(|c| c.self_user_id.clone()) else {
            return;
        };
        let Some(current) = state.current.as_mut().filter(|c| c.id == content_id) else {
            return;
        };

        // Replace wholesale, keeping the local read flag.
        let mut responses = update.responses;
        for response in responses.iter_mut() {
            if current
                .responses
                .iter()
                .any(|known| known.id == response.id && known.is_read)
            {
                response.is_read = true;
            }
        }
        current.responses = responses;
        let snapshot = current.clone();
        state.nested_responses_seen = true;

        if let Err(e) = self.inner.cache.put(&snapshot).await {
            tracing::warn!(content_id, error = %e, "Failed to cache responses");
        }
        if let Some(new_response) = update.new_response {
            self.inner.gate.notify(&snapshot, &new_response, &self_id);
        }
        self.publish(&state);
    }

    // ─── Generation ──────────────────────────────────────────────

    /// Start a generation request if today's item is still missing.
    fn maybe_generate(&self, state: &mut ControllerState) {
        let Some(couple) = state.couple.clone() else {
            return;
        };
        if state.generating {
            return;
        }

        let now = self.inner.time.now();
        let clock = &self.inner.clock;
        let needed = match &state.settings {
            Some(settings) => {
                let expected = clock.expected_day_index(settings, now);
                clock.should_advance(Some(settings), now)
                    && state
                        .current
                        .as_ref()
                        .map_or(true, |c| c.day_index < expected)
            }
            None => state
                .current
                .as_ref()
                .map_or(true, |c| c.scheduled_date < clock.today(now)),
        };
        if !needed {
            return;
        }

        tracing::debug!(couple = %couple.key, "Today's content missing; scheduling generation");
        state.generating = true;
        state.generation_task = Some(tokio::spawn(run_generation(
            Arc::downgrade(&self.inner),
            state.epoch,
            couple,
        )));
    }

    async fn finish_generation(&self, epoch: u64, result: Result<GenerationOutcome>) {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        state.generating = false;
        state.generation_task = None;

        match result {
            Ok(GenerationOutcome::Generated {
                item: Some(item), ..
            }) => {
                let newer = state
                    .current
                    .as_ref()
                    .map_or(true, |c| item.recency_cmp(c).is_gt());
                if newer {
                    self.set_current(&mut state, item).await;
                }
                if matches!(
                    state.issue,
                    Some(SyncIssue::GenerationFailed(_))
                        | Some(SyncIssue::SettingsUnavailable)
                        | Some(SyncIssue::EmptyResult)
                ) {
                    state.issue = None;
                }
            }
            Ok(outcome) => tracing::debug!(?outcome, "Generation finished without a new item"),
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed");
                state.issue = Some(SyncIssue::from(&e));
            }
        }
        self.publish(&state);
    }
}

// ─── Background Tasks ────────────────────────────────────────────

async fn run_content(weak: Weak<Inner>, epoch: u64, mut sub: Subscription) {
    while let Some(snapshot) = sub.next().await {
        let Some(controller) = RemoteSyncController::from_weak(&weak) else {
            return;
        };
        match snapshot {
            Ok(docs) => controller.reconcile(epoch, docs).await,
            Err(e) => {
                controller
                    .on_content_error(epoch, SyncError::SubscriptionFailed(e.to_string()))
                    .await;
                return;
            }
        }
    }
    tracing::debug!("Live content view closed");
}

async fn run_settings(weak: Weak<Inner>, epoch: u64, mut sub: Subscription) {
    while let Some(snapshot) = sub.next().await {
        let Some(controller) = RemoteSyncController::from_weak(&weak) else {
            return;
        };
        match snapshot {
            Ok(docs) => controller.apply_settings(epoch, docs).await,
            Err(e) => {
                tracing::warn!(error = %e, "Settings view failed");
                return;
            }
        }
    }
}

async fn run_responses(weak: Weak<Inner>, epoch: u64, content_id: String, mut sub: Subscription) {
    while let Some(snapshot) = sub.next().await {
        let Some(controller) = RemoteSyncController::from_weak(&weak) else {
            return;
        };
        match snapshot {
            Ok(docs) => controller.apply_responses(epoch, &content_id, docs).await,
            Err(e) => {
                tracing::warn!(content_id = %content_id, error = %e, "Response view failed");
                return;
            }
        }
    }
}

async fn run_generation(weak: Weak<Inner>, epoch: u64, couple: Couple) {
    let Some(controller) = RemoteSyncController::from_weak(&weak) else {
        return;
    };
    let result = controller.inner.generation.generate_today(&couple).await;
    controller.finish_generation(epoch, result).await;
}
