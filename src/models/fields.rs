// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Defensive field accessors for untyped remote documents.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Non-empty string field, trying each name in order.
pub(crate) fn string(fields: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Positive integer field. Accepts integral floats and numeric strings,
/// which some clients write by mistake.
pub(crate) fn positive_u32(fields: &Value, name: &str) -> Option<u32> {
    let value = fields.get(name)?;
    let number = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(number).ok().filter(|n| *n >= 1)
}

pub(crate) fn instant(fields: &Value, name: &str) -> Option<DateTime<Utc>> {
    fields.get(name).and_then(crate::time_utils::parse_instant)
}

pub(crate) fn boolean(fields: &Value, name: &str) -> Option<bool> {
    fields.get(name).and_then(|v| v.as_bool())
}
