// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Couple identity: the partition key shared by every other entity.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between the two sorted user IDs.
pub const COUPLE_KEY_SEPARATOR: char = '_';

/// Canonical, order-independent key for a linked pair of users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoupleKey(String);

impl CoupleKey {
    /// Derive the key for two users.
    ///
    /// The IDs are sorted lexicographically before joining, so the result
    /// does not depend on argument order.
    pub fn derive(user_a: &str, user_b: &str) -> Result<Self> {
        let (a, b) = (user_a.trim(), user_b.trim());
        if a.is_empty() || b.is_empty() {
            return Err(SyncError::InvalidIdentity(
                "user identifiers must be non-empty".to_string(),
            ));
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self(format!("{first}{COUPLE_KEY_SEPARATOR}{second}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoupleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pairing as seen from one device: who "self" is and who the partner is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Couple {
    pub key: CoupleKey,
    pub self_user_id: String,
    pub self_name: String,
    pub partner_user_id: String,
    /// Device timezone name, sent to the server as an advisory value
    pub timezone: String,
}

impl Couple {
    pub fn new(
        self_user_id: impl Into<String>,
        self_name: impl Into<String>,
        partner_user_id: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Result<Self> {
        let self_user_id = self_user_id.into();
        let partner_user_id = partner_user_id.into();
        let key = CoupleKey::derive(&self_user_id, &partner_user_id)?;

        Ok(Self {
            key,
            self_user_id: self_user_id.trim().to_string(),
            self_name: self_name.into(),
            partner_user_id: partner_user_id.trim().to_string(),
            timezone: timezone.into(),
        })
    }
}
