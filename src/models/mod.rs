// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod recommendation;
pub mod records;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod user;

pub use activity::{is_running_type, superseded_efforts, Activity, BestEffort, RUNNING_TYPES};
pub use recommendation::{
    MatchSource, Recommendation, RecommendationStatus, WorkoutPlan, WorkoutType,
};
pub use records::PersonalRecord;
pub use settings::{MonthlyGoal, RaceTarget, TrainingSettings};
pub use stats::{DashboardStats, DateRange, PeriodStats};
pub use sync::SyncState;
pub use user::{User, UserTokens};
