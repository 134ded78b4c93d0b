// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Day-index arithmetic in the fixed reference zone.
//!
//! All day boundaries are computed in one canonical zone rather than the
//! device's local calendar, so partners in different zones (or a partner
//! who travels) agree on which day it is.

use crate::models::ContentSettings;
use crate::time_utils::date_in_zone;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    reference: FixedOffset,
}

impl DayClock {
    pub fn new(reference: FixedOffset) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &FixedOffset {
        &self.reference
    }

    /// Reference-zone calendar date of `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        date_in_zone(now, &self.reference)
    }

    /// Reference-zone wall-clock time of `now`.
    pub fn time_of_day(&self, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&self.reference).time()
    }

    /// 1-based count of reference-zone calendar days since the start date.
    ///
    /// Instants before the start date clamp to day 1.
    pub fn expected_day_index(&self, settings: &ContentSettings, now: DateTime<Utc>) -> u32 {
        let elapsed = (self.today(now) - settings.start_date).num_days();
        u32::try_from(elapsed.saturating_add(1)).unwrap_or(0).max(1)
    }

    /// Whether today's content may still need generating.
    ///
    /// True with no settings (first use) and on every day until the
    /// server-side index has caught up with the expected one.
    pub fn should_advance(&self, settings: Option<&ContentSettings>, now: DateTime<Utc>) -> bool {
        match settings {
            None => true,
            Some(settings) => self.expected_day_index(settings, now) >= settings.current_day_index,
        }
    }
}
