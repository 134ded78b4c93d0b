// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local content cache (SQLite).
//!
//! One row per content item. Queryable columns sit next to a JSON payload
//! holding the whole item, responses included, so every write replaces an
//! item atomically. Nothing here touches the network.

use crate::error::{Result, SyncError};
use crate::models::{ContentItem, CoupleKey};
use crate::time_utils::{format_date, SystemClock, TimeSource};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// A cached item together with the time it was last written locally.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub item: ContentItem,
    pub last_cached_at: DateTime<Utc>,
}

/// Durable local store of content items, partitioned by couple.
#[derive(Clone)]
pub struct ContentCache {
    pool: SqlitePool,
    clock: Arc<dyn TimeSource>,
}

impl ContentCache {
    const DEFAULT_POOL_SIZE: u32 = 4;

    /// Open (and migrate) a cache database.
    ///
    /// The URL should be in the format `sqlite:path/to/cache.db?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(cache_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_POOL_SIZE)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(cache_err)?;

        tracing::info!(url, "Opened content cache");
        Self::from_pool(pool).await
    }

    /// Open a private in-memory cache (tests, previews).
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(cache_err)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(cache_err)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SyncError::Cache(format!("migration failed: {}", e)))?;

        Ok(Self {
            pool,
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp `last_cached_at` from the given clock instead of the wall clock.
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Upsert an item by ID.
    ///
    /// Last write wins on `updated_at`: a write carrying an older
    /// `updated_at` than the stored row is ignored. Returns whether the
    /// write was stored.
    pub async fn put(&self, item: &ContentItem) -> Result<bool> {
        let payload = serde_json::to_string(item)
            .map_err(|e| SyncError::Cache(format!("failed to encode item {}: {}", item.id, e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO content_cache
                (id, couple_id, day_index, scheduled_date, updated_at_ms, last_cached_at_ms, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                couple_id = excluded.couple_id,
                day_index = excluded.day_index,
                scheduled_date = excluded.scheduled_date,
                updated_at_ms = excluded.updated_at_ms,
                last_cached_at_ms = excluded.last_cached_at_ms,
                payload = excluded.payload
            WHERE excluded.updated_at_ms >= content_cache.updated_at_ms
            "#,
        )
        .bind(&item.id)
        .bind(&item.couple_id)
        .bind(i64::from(item.day_index))
        .bind(format_date(item.scheduled_date))
        .bind(item.updated_at.timestamp_millis())
        .bind(self.clock.now().timestamp_millis())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(cache_err)?;

        let stored = result.rows_affected() > 0;
        if !stored {
            tracing::debug!(content_id = %item.id, "Ignored stale cache write");
        }
        Ok(stored)
    }

    /// Most recent items for a couple, highest day index first.
    pub async fn get_recent(&self, couple: &CoupleKey, limit: usize) -> Result<Vec<ContentItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT payload, last_cached_at_ms FROM content_cache
            WHERE couple_id = ?
            ORDER BY day_index DESC, updated_at_ms DESC
            LIMIT ?
            "#,
        )
        .bind(couple.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(cache_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| decode_row(row).map(|entry| entry.item))
            .collect())
    }

    /// The item scheduled for `date`, if cached.
    pub async fn get_for_date(
        &self,
        couple: &CoupleKey,
        date: NaiveDate,
    ) -> Result<Option<ContentItem>> {
        Ok(self
            .entry_for_date(couple, date)
            .await?
            .map(|entry| entry.item))
    }

    /// Like [`get_for_date`](Self::get_for_date), with the local write time.
    pub async fn entry_for_date(
        &self,
        couple: &CoupleKey,
        date: NaiveDate,
    ) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT payload, last_cached_at_ms FROM content_cache
            WHERE couple_id = ? AND scheduled_date = ?
            ORDER BY day_index DESC, updated_at_ms DESC
            LIMIT 1
            "#,
        )
        .bind(couple.as_str())
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await
        .map_err(cache_err)?;

        Ok(row.and_then(decode_row))
    }

    /// Look up a single item by ID.
    pub async fn get(&self, content_id: &str) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT payload, last_cached_at_ms FROM content_cache WHERE id = ?",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(cache_err)?;

        Ok(row.and_then(decode_row).map(|entry| entry.item))
    }

    /// Number of items cached for a couple.
    pub async fn count(&self, couple: &CoupleKey) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM content_cache WHERE couple_id = ?",
        )
        .bind(couple.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(cache_err)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Drop everything cached for a couple. Returns the number of items removed.
    pub async fn clear(&self, couple: &CoupleKey) -> Result<u64> {
        let result = sqlx::query("DELETE FROM content_cache WHERE couple_id = ?")
            .bind(couple.as_str())
            .execute(&self.pool)
            .await
            .map_err(cache_err)?;

        tracing::info!(couple = %couple, removed = result.rows_affected(), "Cleared content cache");
        Ok(result.rows_affected())
    }
}

fn decode_row((payload, cached_ms): (String, i64)) -> Option<CacheEntry> {
    let item: ContentItem = match serde_json::from_str(&payload) {
        Ok(item) => item,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable cache row");
            return None;
        }
    };
    let last_cached_at = Utc.timestamp_millis_opt(cached_ms).single()?;
    Some(CacheEntry {
        item,
        last_cached_at,
    })
}

fn cache_err(e: sqlx::Error) -> SyncError {
    SyncError::Cache(e.to_string())
}
