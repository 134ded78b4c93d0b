// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily-Sync: keeps two partners' devices showing the same daily content
//!
//! This crate provides the embeddable engine that derives a shared couple
//! identity, decides which item is "today's", mirrors the remote content
//! store into a local cache, asks the server to generate missing content,
//! and raises notifications when the partner responds.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod remote;
pub mod services;
pub mod time_utils;

pub use config::Config;
pub use error::{Result, SyncError, SyncIssue};
pub use models::{ContentItem, ContentSettings, Couple, CoupleKey, ResponseRecord};
pub use services::{Collaborators, RemoteSyncController, SyncPhase, SyncView};
