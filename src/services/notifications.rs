// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification gate: decides which partner responses raise a local
//! notification and keeps at most one live notification per content item.

use crate::models::{ContentItem, ResponseRecord};
use crate::remote::NotificationSink;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex characters kept from the digest.
const IDENTIFIER_LEN: usize = 32;
/// Longest response excerpt placed in a notification body.
const BODY_MAX_CHARS: usize = 140;

/// Stable notification identifier for a response on a content item.
pub fn notification_id(content_id: &str, response_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(response_id.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(IDENTIFIER_LEN);
    id
}

/// Filters response events into local notifications.
pub struct NotificationGate {
    sink: Arc<dyn NotificationSink>,
    /// Last identifier raised per content ID
    raised: DashMap<String, String>,
}

impl NotificationGate {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            raised: DashMap::new(),
        }
    }

    /// Never notify a user about their own submission.
    pub fn should_notify(response: &ResponseRecord, self_user_id: &str) -> bool {
        response.author_id != self_user_id
    }

    /// Raise a notification for a new response, superseding any earlier one
    /// for the same content item.
    ///
    /// Returns the identifier raised, or `None` when the response is
    /// filtered out or the sink refused it.
    pub fn notify(
        &self,
        content: &ContentItem,
        response: &ResponseRecord,
        self_user_id: &str,
    ) -> Option<String> {
        if !Self::should_notify(response, self_user_id) {
            tracing::debug!(
                content_id = %content.id,
                response_id = %response.id,
                "Suppressed self-authored response notification"
            );
            return None;
        }

        let identifier = notification_id(&content.id, &response.id);

        // Remove whatever is showing for this item, including an earlier
        // notification for this very response, before raising the new one.
        if let Some((_, previous)) = self.raised.remove(&content.id) {
            self.cancel_quietly(&previous);
        }
        self.cancel_quietly(&identifier);

        let title = if response.author_name.is_empty() {
            "Your partner answered".to_string()
        } else {
            format!("{} answered", response.author_name)
        };
        let body = excerpt(&response.text);

        match self.sink.raise(&identifier, &title, &body) {
            Ok(()) => {
                tracing::info!(
                    content_id = %content.id,
                    response_id = %response.id,
                    notification_id = %identifier,
                    "Raised partner response notification"
                );
                self.raised.insert(content.id.clone(), identifier.clone());
                Some(identifier)
            }
            Err(e) => {
                tracing::warn!(error = %e, notification_id = %identifier, "Failed to raise notification");
                None
            }
        }
    }

    /// Withdraw every notification raised for a content item.
    pub fn clear_content(&self, content_id: &str) {
        self.raised.remove(content_id);
        if let Err(e) = self.sink.cancel_all_for_content(content_id) {
            tracing::warn!(error = %e, content_id, "Failed to cancel notifications");
        }
    }

    fn cancel_quietly(&self, identifier: &str) {
        if let Err(e) = self.sink.cancel(identifier) {
            tracing::debug!(error = %e, notification_id = identifier, "Cancel failed");
        }
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= BODY_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(BODY_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}
