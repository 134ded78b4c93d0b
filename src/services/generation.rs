// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generation coordinator: asks the server to create today's content.
//!
//! Workflow for one call:
//! 1. Make sure the couple has settings (bootstrap + bounded poll)
//! 2. Re-check whether the day actually needs advancing
//! 3. Call the remote generate procedure and cache the returned item
//! 4. Persist the new day index (best-effort)
//!
//! At most one call per couple is in flight at a time; duplicates return
//! immediately. The server is the authority on idempotency; the checks
//! here only avoid redundant round trips.

use crate::config::Config;
use crate::db::ContentCache;
use crate::error::{Result, SyncError};
use crate::models::{ContentItem, ContentSettings, Couple, CoupleKey};
use crate::remote::{
    BootstrapSettingsRequest, GenerateRequest, RemoteProcedures, RemoteStore, SettingsUpdate,
};
use crate::services::{with_timeout, DayClock};
use crate::time_utils::{format_date, TimeSource};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// What a `generate_today` call ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The server generated (or returned) today's item.
    ///
    /// `item` is `None` when the reply carried no usable item; the live
    /// subscription will deliver it instead.
    Generated {
        day_index: u32,
        item: Option<ContentItem>,
    },
    /// Another call for the same couple is still running.
    AlreadyInFlight,
    /// Nothing to do: today's content already exists.
    UpToDate { day_index: u32 },
}

/// Removes the couple's in-flight marker when the call finishes, however it finishes.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<CoupleKey, ()>,
    key: CoupleKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

pub struct GenerationCoordinator {
    store: Arc<dyn RemoteStore>,
    procedures: Arc<dyn RemoteProcedures>,
    cache: ContentCache,
    clock: DayClock,
    time: Arc<dyn TimeSource>,
    /// Couples with a generation call outstanding
    in_flight: DashMap<CoupleKey, ()>,
    /// Highest day index this instance has seen generated, per couple
    generated: DashMap<CoupleKey, u32>,
    remote_timeout: Duration,
    bootstrap_attempts: u32,
    bootstrap_interval: Duration,
}

impl GenerationCoordinator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        procedures: Arc<dyn RemoteProcedures>,
        cache: ContentCache,
        time: Arc<dyn TimeSource>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            procedures,
            cache,
            clock: DayClock::new(config.reference_offset),
            time,
            in_flight: DashMap::new(),
            generated: DashMap::new(),
            remote_timeout: config.remote_timeout,
            bootstrap_attempts: config.bootstrap_attempts,
            bootstrap_interval: config.bootstrap_interval,
        }
    }

    /// Whether a generation call is currently running for the couple.
    pub fn is_in_flight(&self, couple: &CoupleKey) -> bool {
        self.in_flight.contains_key(couple)
    }

    /// Generate today's content for `couple` if it does not exist yet.
    pub async fn generate_today(&self, couple: &Couple) -> Result<GenerationOutcome> {
        if self.in_flight.insert(couple.key.clone(), ()).is_some() {
            tracing::debug!(couple = %couple.key, "Generation already in flight");
            return Ok(GenerationOutcome::AlreadyInFlight);
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: couple.key.clone(),
        };

        // 1. Settings must exist before the server can generate.
        let settings = self.ensure_settings(couple).await?;

        // 2. Re-check: another caller may already have advanced the day.
        let now = self.time.now();
        if !self.clock.should_advance(Some(&settings), now) {
            tracing::debug!(
                couple = %couple.key,
                current_day_index = settings.current_day_index,
                "Day already advanced"
            );
            return Ok(GenerationOutcome::UpToDate {
                day_index: settings.current_day_index,
            });
        }

        let day_index = self.clock.expected_day_index(&settings, now);
        let today = self.clock.today(now);

        if self
            .generated
            .get(&couple.key)
            .is_some_and(|done| *done >= day_index)
        {
            return Ok(GenerationOutcome::UpToDate { day_index });
        }
        match self.cache.get_for_date(&couple.key, today).await {
            Ok(Some(existing)) if existing.day_index >= day_index => {
                tracing::debug!(couple = %couple.key, day_index, "Today's content already cached");
                self.generated.insert(couple.key.clone(), existing.day_index);
                return Ok(GenerationOutcome::UpToDate { day_index });
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Cache lookup failed before generation"),
        }

        // 3. Ask the server for today's item.
        let request = GenerateRequest {
            couple_id: couple.key.as_str().to_string(),
            user_id: couple.self_user_id.clone(),
            day_index,
            timezone: couple.timezone.clone(),
        };

        tracing::info!(couple = %couple.key, day_index, "Requesting today's content");

        let outcome = with_timeout(self.remote_timeout, self.procedures.generate_today(&request))
            .await
            .map_err(|e| match e {
                SyncError::Timeout(_) => e,
                other => SyncError::GenerationFailed(other.to_string()),
            })?;

        if !outcome.success {
            let message = outcome.failure_message();
            tracing::warn!(couple = %couple.key, day_index, message = %message, "Generation rejected");
            return Err(SyncError::GenerationFailed(message));
        }

        // Show the new item right away instead of waiting for the live echo.
        let item = self.item_from_payload(&outcome.payload, couple, day_index, today);
        match &item {
            Some(item) => {
                if let Err(e) = self.cache.put(item).await {
                    tracing::warn!(error = %e, content_id = %item.id, "Failed to cache generated item");
                }
            }
            None => tracing::warn!(
                couple = %couple.key,
                day_index,
                "Generation reply carried no usable item"
            ),
        }
        self.generated.insert(couple.key.clone(), day_index);

        // 4. Best-effort: the live settings view corrects any miss.
        self.persist_day_index(couple, day_index, today).await;

        tracing::info!(couple = %couple.key, day_index, "Today's content generated");
        Ok(GenerationOutcome::Generated { day_index, item })
    }

    /// Read settings, bootstrapping them on first use.
    async fn ensure_settings(&self, couple: &Couple) -> Result<ContentSettings> {
        if let Some(settings) = self.read_settings(&couple.key).await? {
            return Ok(settings);
        }

        tracing::info!(couple = %couple.key, "Bootstrapping couple settings");

        let request = BootstrapSettingsRequest {
            couple_id: couple.key.as_str().to_string(),
            timezone: couple.timezone.clone(),
        };
        let outcome =
            with_timeout(self.remote_timeout, self.procedures.bootstrap_settings(&request)).await?;

        if outcome.success {
            if let Some(settings) = outcome
                .payload
                .get("settings")
                .and_then(|doc| ContentSettings::from_document(doc, self.clock.reference()))
            {
                return Ok(settings);
            }
        } else {
            // The partner may be bootstrapping concurrently; keep polling.
            tracing::warn!(
                couple = %couple.key,
                message = %outcome.failure_message(),
                "Settings bootstrap reported failure"
            );
        }

        for attempt in 1..=self.bootstrap_attempts {
            tokio::time::sleep(self.bootstrap_interval).await;
            match self.read_settings(&couple.key).await {
                Ok(Some(settings)) => {
                    tracing::debug!(couple = %couple.key, attempt, "Settings available");
                    return Ok(settings);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(attempt, error = %e, "Settings read failed while polling"),
            }
        }

        Err(SyncError::SettingsUnavailable {
            attempts: self.bootstrap_attempts,
        })
    }

    async fn read_settings(&self, couple: &CoupleKey) -> Result<Option<ContentSettings>> {
        let Some(doc) = with_timeout(self.remote_timeout, self.store.get_settings(couple)).await?
        else {
            return Ok(None);
        };

        let settings = ContentSettings::from_document(&doc.fields, self.clock.reference());
        if settings.is_none() {
            tracing::warn!(couple = %couple, "Ignoring malformed settings document");
        }
        Ok(settings)
    }

    async fn persist_day_index(&self, couple: &Couple, day_index: u32, today: chrono::NaiveDate) {
        let update = SettingsUpdate {
            couple_id: couple.key.as_str().to_string(),
            current_day_index: day_index,
            last_visit_date: format_date(today),
        };

        match with_timeout(self.remote_timeout, self.procedures.update_settings(&update)).await {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => tracing::warn!(
                couple = %couple.key,
                message = %outcome.failure_message(),
                "Settings update rejected"
            ),
            Err(e) => tracing::warn!(couple = %couple.key, error = %e, "Settings update failed"),
        }
    }

    /// Build a local item from the generate reply.
    ///
    /// Fields the server left implicit (couple, day, date) are filled from
    /// the request that produced the reply.
    fn item_from_payload(
        &self,
        payload: &Value,
        couple: &Couple,
        day_index: u32,
        today: chrono::NaiveDate,
    ) -> Option<ContentItem> {
        let mut doc = payload.get("item")?.clone();
        let fields = doc.as_object_mut()?;
        let id = fields.get("id").and_then(|v| v.as_str())?.to_string();

        fields
            .entry("coupleId")
            .or_insert_with(|| Value::String(couple.key.as_str().to_string()));
        fields
            .entry("dayIndex")
            .or_insert_with(|| Value::from(day_index));
        fields
            .entry("scheduledDate")
            .or_insert_with(|| Value::String(format_date(today)));
        fields
            .entry("createdAt")
            .or_insert_with(|| Value::String(crate::time_utils::format_utc_rfc3339(self.time.now())));

        ContentItem::from_document(&id, &doc, self.clock.reference())
            .filter(|item| item.couple_id == couple.key.as_str())
    }
}
