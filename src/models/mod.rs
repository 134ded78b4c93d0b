// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the engine.
//!
//! Remote documents arrive as untyped key/value maps; every model here has a
//! `from_document` constructor that casts fields defensively and returns
//! `None` for records missing required fields.

pub mod content;
pub mod couple;
mod fields;
pub mod response;
pub mod settings;

pub use content::{ContentItem, ContentStatus};
pub use couple::{Couple, CoupleKey};
pub use response::{ResponseRecord, ResponseStatus};
pub use settings::ContentSettings;
