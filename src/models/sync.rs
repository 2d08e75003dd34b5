// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Sync progress for one athlete (document ID = athlete ID).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncState {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// When the last sync finished (ISO 8601)
    #[serde(default)]
    pub last_sync_at: Option<String>,
    /// Start of the newest synced activity; the next incremental sync
    /// asks Strava for activities after this instant
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub last_activity_start: Option<DateTime<Utc>>,
    /// Running total of activities written
    #[serde(default)]
    pub activities_synced: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn new(athlete_id: u64) -> Self {
        Self {
            athlete_id,
            ..Default::default()
        }
    }
}
