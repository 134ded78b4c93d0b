// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Decides whether a refresh needs to touch the remote store at all.
//!
//! Purely a read-volume optimization: the sync controller stays correct if
//! this always answers `true`.

use crate::config::Config;
use crate::db::CacheEntry;
use crate::services::DayClock;
use chrono::{DateTime, Duration, NaiveTime, Utc};

#[derive(Debug, Clone)]
pub struct OptimizationPolicy {
    clock: DayClock,
    rollover_window: Duration,
    evening_start: NaiveTime,
    evening_end: NaiveTime,
    max_staleness: Duration,
}

impl OptimizationPolicy {
    pub fn new(clock: DayClock, config: &Config) -> Self {
        Self {
            clock,
            rollover_window: Duration::from_std(config.rollover_window)
                .unwrap_or_else(|_| Duration::minutes(10)),
            evening_start: config.evening_window_start,
            evening_end: config.evening_window_end,
            max_staleness: Duration::from_std(config.max_cache_staleness)
                .unwrap_or_else(|_| Duration::minutes(30)),
        }
    }

    /// Whether `now` falls in a critical window: just after the
    /// reference-zone midnight, or inside the evening reminder window.
    pub fn in_critical_window(&self, now: DateTime<Utc>) -> bool {
        let time = self.clock.time_of_day(now);
        let since_midnight = time - NaiveTime::MIN;
        if since_midnight < self.rollover_window {
            return true;
        }
        time >= self.evening_start && time < self.evening_end
    }

    /// `today_entry` is the cache entry for today's reference-zone date, if any.
    pub fn should_consult_remote(&self, today_entry: Option<&CacheEntry>, now: DateTime<Utc>) -> bool {
        let Some(entry) = today_entry else {
            return true;
        };
        if entry.item.scheduled_date != self.clock.today(now) {
            return true;
        }
        if self.in_critical_window(now) {
            return true;
        }
        now - entry.last_cached_at > self.max_staleness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, ContentStatus};
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn policy() -> OptimizationPolicy {
        let clock = DayClock::new(FixedOffset::east_opt(0).unwrap());
        OptimizationPolicy::new(clock, &Config::default())
    }

    fn entry(date: NaiveDate, cached_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            item: ContentItem {
                id: "c1".to_string(),
                couple_id: "alice_bob".to_string(),
                content_key: "q".to_string(),
                day_index: 1,
                scheduled_date: date,
                scheduled_date_time: None,
                status: ContentStatus::Active,
                created_at: cached_at,
                updated_at: cached_at,
                responses: Vec::new(),
            },
            last_cached_at: cached_at,
        }
    }

    #[test]
    fn test_consults_when_today_missing() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap();
        assert!(policy().should_consult_remote(None, now));

        let yesterday = entry(NaiveDate::from_ymd_opt(2026, 5, 31).unwrap(), now);
        assert!(policy().should_consult_remote(Some(&yesterday), now));
    }

    #[test]
    fn test_quiet_hours_skip_remote_with_fresh_cache() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap();
        let fresh = entry(now.date_naive(), now - Duration::minutes(5));
        assert!(!policy().should_consult_remote(Some(&fresh), now));

        let stale = entry(now.date_naive(), now - Duration::hours(2));
        assert!(policy().should_consult_remote(Some(&stale), now));
    }

    #[test]
    fn test_critical_windows() {
        let p = policy();
        let day = |h, m| Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap();

        assert!(p.in_critical_window(day(0, 3)));
        assert!(!p.in_critical_window(day(0, 30)));
        assert!(p.in_critical_window(day(20, 15)));
        assert!(!p.in_critical_window(day(21, 0)));

        let fresh = entry(day(20, 15).date_naive(), day(20, 14));
        assert!(p.should_consult_remote(Some(&fresh), day(20, 15)));
    }
}
