// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily content item model for storage and display.

use crate::models::fields;
use crate::models::response::ResponseRecord;
use crate::remote::Localizer;
use crate::time_utils::parse_date_in_zone;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Active,
    Completed,
}

impl ContentStatus {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One day's shared content for a couple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Remote document ID
    pub id: String,
    pub couple_id: String,
    /// Opaque key resolved to display text by a [`Localizer`]
    pub content_key: String,
    /// 1-based day index since the couple's start date
    pub day_index: u32,
    /// Reference-zone calendar date this item belongs to
    pub scheduled_date: NaiveDate,
    /// Advisory delivery instant
    pub scheduled_date_time: Option<DateTime<Utc>>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Responses, oldest first
    #[serde(default)]
    pub responses: Vec<ResponseRecord>,
}

impl ContentItem {
    /// Parse a content document.
    ///
    /// Required: `coupleId`, `contentKey` (or the older `questionKey`), a
    /// positive `dayIndex` and `scheduledDate`. Timestamps are optional:
    /// `updatedAt` falls back to `createdAt`, which falls back to the
    /// reference-zone midnight of `scheduledDate`. Unknown statuses read as
    /// active. The deprecated flat `responses` map seeds `responses` until
    /// the nested stream replaces it.
    pub fn from_document(id: &str, doc: &Value, reference: &FixedOffset) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }

        let couple_id = fields::string(doc, &["coupleId"])?;
        let content_key = fields::string(doc, &["contentKey", "questionKey"])?;
        let day_index = fields::positive_u32(doc, "dayIndex")?;
        let scheduled_date = doc
            .get("scheduledDate")
            .and_then(|v| parse_date_in_zone(v, reference))?;

        let created_at = fields::instant(doc, "createdAt")
            .or_else(|| midnight_in_zone(scheduled_date, reference))?;
        let updated_at = fields::instant(doc, "updatedAt").unwrap_or(created_at);

        let status = doc
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(ContentStatus::parse)
            .unwrap_or(ContentStatus::Active);

        let responses = doc
            .get("responses")
            .map(ResponseRecord::from_legacy_map)
            .unwrap_or_default();

        Some(Self {
            id: id.to_string(),
            couple_id,
            content_key,
            day_index,
            scheduled_date,
            scheduled_date_time: fields::instant(doc, "scheduledDateTime"),
            status,
            created_at,
            updated_at,
            responses,
        })
    }

    /// Ordering used to pick the "current" item: highest day index first,
    /// then the most recently updated.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.day_index
            .cmp(&other.day_index)
            .then_with(|| self.updated_at.cmp(&other.updated_at))
    }

    /// Whether `user_id` has already responded to this item.
    pub fn has_response_from(&self, user_id: &str) -> bool {
        self.responses.iter().any(|r| r.author_id == user_id)
    }

    /// Resolve display text through the host's localization layer.
    pub fn display_text(&self, localizer: &dyn Localizer) -> String {
        localizer.resolve(&self.content_key)
    }
}

/// Pick the current item from a set of candidates.
///
/// Duplicate day indices are tolerated; the latest `updated_at` wins.
pub fn select_current(items: &[ContentItem]) -> Option<&ContentItem> {
    items.iter().max_by(|a, b| a.recency_cmp(b))
}

fn midnight_in_zone(date: NaiveDate, zone: &FixedOffset) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .single()
        .map(|d| d.with_timezone(&Utc))
}
