// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partner response records nested under a content item.

use crate::models::fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Answered,
}

/// One partner's response to a content item.
///
/// Immutable once created except for `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub responded_at: DateTime<Utc>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub is_read: bool,
}

impl ResponseRecord {
    /// Parse a document from the nested `responses` collection.
    ///
    /// Requires `authorId`, `text` and `respondedAt`.
    pub fn from_document(id: &str, doc: &Value) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }

        let status = match doc.get("status").and_then(|v| v.as_str()) {
            Some("pending") => ResponseStatus::Pending,
            _ => ResponseStatus::Answered,
        };

        Some(Self {
            id: id.to_string(),
            author_id: fields::string(doc, &["authorId", "userId"])?,
            author_name: fields::string(doc, &["authorName", "userName"]).unwrap_or_default(),
            text: doc.get("text").and_then(|v| v.as_str())?.to_string(),
            responded_at: fields::instant(doc, "respondedAt")?,
            status,
            is_read: fields::boolean(doc, "isRead").unwrap_or(false),
        })
    }

    /// Parse the deprecated flat response map stored on the content document
    /// itself (`responses: { <userId>: { text, authorName, respondedAt } }`).
    ///
    /// Entries are keyed by author, so the author ID doubles as the record ID.
    pub fn from_legacy_map(map: &Value) -> Vec<Self> {
        let Some(entries) = map.as_object() else {
            return Vec::new();
        };

        let mut records: Vec<Self> = entries
            .iter()
            .filter_map(|(author_id, entry)| {
                let mut entry = entry.clone();
                if let Some(obj) = entry.as_object_mut() {
                    obj.entry("authorId")
                        .or_insert_with(|| Value::String(author_id.clone()));
                }
                Self::from_document(author_id, &entry)
            })
            .collect();
        sort_by_responded_at(&mut records);
        records
    }
}

/// Order responses oldest first, breaking ties by ID for determinism.
pub fn sort_by_responded_at(records: &mut [ResponseRecord]) {
    records.sort_by(|a, b| {
        a.responded_at
            .cmp(&b.responded_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
