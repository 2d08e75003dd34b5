// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    pub const ACTIVITIES: &str = "activities";
    pub const BEST_EFFORTS: &str = "best_efforts";
    /// One document per athlete per distance bucket
    pub const PERSONAL_RECORDS: &str = "personal_records";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const TRAINING_SETTINGS: &str = "training_settings";
    /// Keyed by `{athlete_id}_{YYYY-MM}`
    pub const MONTHLY_GOALS: &str = "monthly_goals";
    pub const SYNC_STATE: &str = "sync_state";
}
