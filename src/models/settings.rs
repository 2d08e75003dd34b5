// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user training settings and monthly distance goals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Default sessions per week for a user who never saved settings.
pub const DEFAULT_WEEKLY_FREQUENCY: u8 = 3;

/// An upcoming race the athlete is training for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RaceTarget {
    pub name: String,
    /// Free-form distance label, e.g. "semi" or "10km"
    pub distance_label: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub race_date: NaiveDate,
    #[serde(default)]
    pub target_time_seconds: Option<u32>,
}

/// Training settings (document ID = athlete ID).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TrainingSettings {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    #[serde(default)]
    pub race_target: Option<RaceTarget>,
    pub weekly_frequency: u8,
    pub updated_at: String,
}

impl TrainingSettings {
    pub fn default_for(athlete_id: u64) -> Self {
        Self {
            athlete_id,
            race_target: None,
            weekly_frequency: DEFAULT_WEEKLY_FREQUENCY,
            updated_at: String::new(),
        }
    }
}

/// Monthly distance goal (document ID = `{athlete}_{YYYY-MM}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthlyGoal {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// "YYYY-MM"
    pub month: String,
    pub distance_goal_meters: f64,
    pub updated_at: String,
}

impl MonthlyGoal {
    pub fn doc_id(&self) -> String {
        goal_doc_id(self.athlete_id, &self.month)
    }
}

pub fn goal_doc_id(athlete_id: u64, month: &str) -> String {
    format!("{}_{}", athlete_id, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_doc_id() {
        let goal = MonthlyGoal {
            athlete_id: 42,
            month: "2024-03".to_string(),
            distance_goal_meters: 150_000.0,
            updated_at: String::new(),
        };
        assert_eq!(goal.doc_id(), "42_2024-03");
    }

    #[test]
    fn test_settings_without_race_target_deserialize() {
        let json = r#"{"athlete_id": 1, "weekly_frequency": 4, "updated_at": ""}"#;
        let settings: TrainingSettings = serde_json::from_str(json).unwrap();
        assert!(settings.race_target.is_none());
        assert_eq!(settings.weekly_frequency, 4);
    }
}
