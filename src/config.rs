// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine configuration loaded from environment variables.
//!
//! Hosts usually build a [`Config`] once at startup and hand it to every
//! engine instance they create.

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use std::env;
use std::time::Duration;

/// Number of recent items requested from the live content subscription.
pub const LIVE_WINDOW_SIZE: usize = 7;
/// Number of cached items read for the cache-first paint.
pub const CACHE_FIRST_LIMIT: usize = 5;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project hosting the remote document store
    pub gcp_project_id: String,
    /// Base URL of the callable functions (e.g. `https://region-project.cloudfunctions.net`)
    pub functions_base_url: String,
    /// SQLite URL for the local content cache
    pub cache_url: String,
    /// Fixed zone used for all day-boundary arithmetic
    pub reference_offset: FixedOffset,
    /// Timeout applied to every remote call except the bootstrap poll
    pub remote_timeout: Duration,
    /// Interval between snapshot polls for live subscriptions
    pub poll_interval: Duration,
    /// Items requested from the live content subscription
    pub live_window: usize,
    /// Items read from the cache on configure
    pub cache_first_limit: usize,
    /// Settings reads attempted after bootstrapping a couple
    pub bootstrap_attempts: u32,
    /// Delay between settings reads after bootstrapping
    pub bootstrap_interval: Duration,
    /// Length of the critical window right after the reference-zone midnight
    pub rollover_window: Duration,
    /// Evening reminder window start (reference zone)
    pub evening_window_start: NaiveTime,
    /// Evening reminder window end (reference zone)
    pub evening_window_end: NaiveTime,
    /// Cache entries older than this always warrant a remote check
    pub max_cache_staleness: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gcp_project_id: "local-dev".to_string(),
            functions_base_url: "http://localhost:5001/local-dev/us-central1".to_string(),
            cache_url: "sqlite:daily_sync.db?mode=rwc".to_string(),
            reference_offset: utc_offset(0),
            remote_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            live_window: LIVE_WINDOW_SIZE,
            cache_first_limit: CACHE_FIRST_LIMIT,
            bootstrap_attempts: 5,
            bootstrap_interval: Duration::from_millis(500),
            rollover_window: Duration::from_secs(10 * 60),
            evening_window_start: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            evening_window_end: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
            max_cache_staleness: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the project ID and functions URL are required; everything else
    /// falls back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let reference_offset = match env::var("DAILY_SYNC_REFERENCE_UTC_OFFSET_MINUTES") {
            Ok(raw) => {
                let minutes: i32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("DAILY_SYNC_REFERENCE_UTC_OFFSET_MINUTES"))?;
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or(ConfigError::Invalid("DAILY_SYNC_REFERENCE_UTC_OFFSET_MINUTES"))?
            }
            Err(_) => defaults.reference_offset,
        };

        Ok(Self {
            gcp_project_id: env::var("DAILY_SYNC_GCP_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("DAILY_SYNC_GCP_PROJECT_ID"))?,
            functions_base_url: env::var("DAILY_SYNC_FUNCTIONS_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("DAILY_SYNC_FUNCTIONS_URL"))?,
            cache_url: env::var("DAILY_SYNC_CACHE_URL").unwrap_or(defaults.cache_url),
            reference_offset,
            remote_timeout: duration_ms_var("DAILY_SYNC_REMOTE_TIMEOUT_MS")
                .unwrap_or(defaults.remote_timeout),
            poll_interval: duration_ms_var("DAILY_SYNC_POLL_INTERVAL_MS")
                .unwrap_or(defaults.poll_interval),
            ..defaults
        })
    }
}

/// Build a fixed offset from whole hours east of UTC, clamping to UTC when out of range.
pub fn utc_offset(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn duration_ms_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
