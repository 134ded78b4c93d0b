// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracks the response stream of the displayed content item and detects
//! newly arrived responses.

use crate::models::response::sort_by_responded_at;
use crate::models::ResponseRecord;
use crate::remote::RawDocument;

/// Result of applying one response snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseUpdate {
    /// Full, ordered response list from the snapshot
    pub responses: Vec<ResponseRecord>,
    /// Newest record when the count grew since the previous snapshot
    pub new_response: Option<ResponseRecord>,
}

#[derive(Debug, Default)]
pub struct ResponseTracker {
    content_id: Option<String>,
    known_count: Option<usize>,
}

impl ResponseTracker {
    /// Follow a new content item. The first snapshot after attaching sets
    /// the baseline and never counts as new.
    pub fn attach(&mut self, content_id: &str) {
        self.content_id = Some(content_id.to_string());
        self.known_count = None;
    }

    pub fn detach(&mut self) {
        self.content_id = None;
        self.known_count = None;
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Apply a snapshot of the nested response collection.
    ///
    /// Returns `None` for snapshots belonging to an item no longer tracked.
    /// Malformed documents are dropped; the rest replace the previous list
    /// wholesale.
    pub fn apply_snapshot(&mut self, content_id: &str, docs: &[RawDocument]) -> Option<ResponseUpdate> {
        if self.content_id.as_deref() != Some(content_id) {
            return None;
        }

        let mut responses: Vec<ResponseRecord> = docs
            .iter()
            .filter_map(|doc| ResponseRecord::from_document(&doc.id, &doc.fields))
            .collect();
        if responses.len() < docs.len() {
            tracing::warn!(
                content_id,
                dropped = docs.len() - responses.len(),
                "Dropped malformed response documents"
            );
        }
        sort_by_responded_at(&mut responses);

        let count = responses.len();
        let new_response = match self.known_count {
            Some(previous) if count > previous => responses.last().cloned(),
            _ => None,
        };
        self.known_count = Some(count);

        Some(ResponseUpdate {
            responses,
            new_response,
        })
    }
}
