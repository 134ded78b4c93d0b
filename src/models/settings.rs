// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-couple content settings.

use crate::models::fields;
use crate::time_utils::parse_date_in_zone;
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings document stored remotely per couple.
///
/// `current_day_index` is server-authoritative and only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSettings {
    /// Anchor date (reference-zone calendar date of day 1)
    pub start_date: NaiveDate,
    /// Advisory device timezone, display-only
    pub timezone: String,
    /// Last day index the server generated content for
    pub current_day_index: u32,
    /// Last reference-zone date a partner opened the content
    pub last_visit_date: Option<NaiveDate>,
}

impl ContentSettings {
    /// Parse a settings document.
    ///
    /// `startDate` may be a `YYYY-MM-DD` string or an instant; instants are
    /// converted to a calendar date in `reference`. Missing or malformed
    /// `startDate` makes the document unusable. A missing `currentDayIndex`
    /// is treated as 1 since a freshly bootstrapped couple starts there.
    pub fn from_document(doc: &Value, reference: &FixedOffset) -> Option<Self> {
        let start_date = doc
            .get("startDate")
            .and_then(|v| parse_date_in_zone(v, reference))?;

        let current_day_index = match doc.get("currentDayIndex") {
            None | Some(Value::Null) => 1,
            Some(_) => fields::positive_u32(doc, "currentDayIndex")?,
        };

        Some(Self {
            start_date,
            timezone: fields::string(doc, &["timezone"]).unwrap_or_default(),
            current_day_index,
            last_visit_date: doc
                .get("lastVisitDate")
                .and_then(|v| parse_date_in_zone(v, reference)),
        })
    }
}
