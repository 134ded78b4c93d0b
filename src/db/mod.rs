// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: the remote document store (Firestore) and the local cache (SQLite).

pub mod cache;
pub mod firestore;

pub use cache::{CacheEntry, ContentCache};
pub use firestore::FirestoreStore;

/// Collection names as constants.
pub mod collections {
    /// Daily content items (one per couple per day)
    pub const DAILY_CONTENT: &str = "dailyContent";
    /// Nested under each daily content document
    pub const RESPONSES: &str = "responses";
    /// Per-couple settings (keyed by couple key)
    pub const COUPLE_SETTINGS: &str = "coupleSettings";
}
