// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity and best-effort models for storage and API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Type tags counted as running. Everything else is stored but ignored
/// by statistics and records.
pub const RUNNING_TYPES: [&str; 2] = ["Run", "TrailRun"];

/// Whether a Strava type tag belongs to the running allow-list.
pub fn is_running_type(activity_type: &str) -> bool {
    RUNNING_TYPES.contains(&activity_type)
}

/// Stored activity record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub strava_activity_id: u64,
    /// Strava athlete ID (owner)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// Activity name/title
    pub name: String,
    /// Sport type tag (Run, TrailRun, Ride, ...)
    pub activity_type: String,
    /// Distance in meters
    pub distance_meters: f64,
    pub moving_time_seconds: u32,
    pub elapsed_time_seconds: u32,
    #[serde(default)]
    pub elevation_gain_meters: f64,
    /// Start date/time (UTC)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: DateTime<Utc>,
    /// Start date/time in the athlete's local timezone
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date_local: NaiveDateTime,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    /// Average speed in m/s
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    /// "City, Country" when Strava provides it
    #[serde(default)]
    pub location: Option<String>,
    /// User-entered perceived effort (1-10)
    #[serde(default)]
    pub effort_rating: Option<u8>,
    /// User-entered notes
    #[serde(default)]
    pub notes: Option<String>,
    /// When this activity was last synced (ISO 8601)
    pub synced_at: String,
}

impl Activity {
    pub fn is_run(&self) -> bool {
        is_running_type(&self.activity_type)
    }

    /// Pace in seconds per kilometre, if the activity covered any distance.
    pub fn pace_seconds_per_km(&self) -> Option<f64> {
        if self.distance_meters <= 0.0 || self.moving_time_seconds == 0 {
            return None;
        }
        Some(self.moving_time_seconds as f64 / (self.distance_meters / 1000.0))
    }

    /// Carry the user's annotations over from a previously stored copy.
    pub fn keep_annotations_from(&mut self, existing: &Activity) {
        self.effort_rating = existing.effort_rating;
        self.notes = existing.notes.clone();
    }

    /// Average speed, falling back to distance / moving time.
    pub fn speed_mps(&self) -> Option<f64> {
        self.average_speed.or_else(|| {
            (self.moving_time_seconds > 0)
                .then(|| self.distance_meters / self.moving_time_seconds as f64)
        })
    }
}

/// Fastest time for a standard sub-distance within one activity.
///
/// Superseded wholesale for an activity each time that activity is re-synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BestEffort {
    /// Strava best-effort ID (also used as document ID)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub best_effort_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activity_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// Strava's label, e.g. "5k"
    pub name: String,
    pub distance_meters: f64,
    pub moving_time_seconds: u32,
    pub elapsed_time_seconds: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: DateTime<Utc>,
    /// Denormalized from the parent activity
    pub activity_name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Stored best efforts to delete when an activity is re-synced.
///
/// `fresh` is `None` when only the summary could be fetched; the stored
/// efforts are then kept as they are.
pub fn superseded_efforts<'a>(
    stored: &'a [BestEffort],
    fresh: Option<&[BestEffort]>,
) -> Vec<&'a BestEffort> {
    let Some(fresh) = fresh else {
        return vec![];
    };
    stored
        .iter()
        .filter(|old| !fresh.iter().any(|e| e.best_effort_id == old.best_effort_id))
        .collect()
}

/// Format a pace as "m:ss/km".
pub fn format_pace(seconds_per_km: f64) -> String {
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02}/km", total / 60, total % 60)
}

/// Format a duration as "h:mm:ss" or "m:ss".
pub fn format_duration(seconds: u32) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_allow_list() {
        assert!(is_running_type("Run"));
        assert!(is_running_type("TrailRun"));
        assert!(!is_running_type("VirtualRun"));
        assert!(!is_running_type("Ride"));
        assert!(!is_running_type("run"));
    }

    fn effort(id: u64) -> BestEffort {
        BestEffort {
            best_effort_id: id,
            activity_id: 100,
            athlete_id: 1,
            name: "5k".to_string(),
            distance_meters: 5000.0,
            moving_time_seconds: 1500,
            elapsed_time_seconds: 1500,
            start_date: DateTime::parse_from_rfc3339("2024-05-01T07:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            activity_name: "Run".to_string(),
            location: None,
        }
    }

    fn ids(efforts: Vec<&BestEffort>) -> Vec<u64> {
        efforts.iter().map(|e| e.best_effort_id).collect()
    }

    #[test]
    fn test_superseded_efforts() {
        let stored = vec![effort(1), effort(2)];

        assert_eq!(ids(superseded_efforts(&stored, Some(&[effort(2), effort(3)]))), vec![1]);
        assert_eq!(ids(superseded_efforts(&stored, Some(&[]))), vec![1, 2]);
    }

    #[test]
    fn test_summary_only_sync_keeps_stored_efforts() {
        let stored = vec![effort(1), effort(2)];
        assert!(superseded_efforts(&stored, None).is_empty());
    }

    #[test]
    fn test_annotations_survive_resync() {
        let fresh_json = serde_json::json!({
            "strava_activity_id": 100,
            "athlete_id": 1,
            "name": "Renamed",
            "activity_type": "Run",
            "distance_meters": 10000.0,
            "moving_time_seconds": 3000,
            "elapsed_time_seconds": 3100,
            "elevation_gain_meters": 20.0,
            "start_date": "2024-05-01T07:00:00Z",
            "start_date_local": "2024-05-01T09:00:00",
            "synced_at": "2024-05-02T00:00:00Z"
        });
        let mut fresh: Activity = serde_json::from_value(fresh_json).unwrap();
        let mut existing = fresh.clone();
        existing.name = "Morning Run".to_string();
        existing.effort_rating = Some(7);
        existing.notes = Some("Hilly".to_string());

        fresh.keep_annotations_from(&existing);

        assert_eq!(fresh.name, "Renamed");
        assert_eq!(fresh.effort_rating, Some(7));
        assert_eq!(fresh.notes.as_deref(), Some("Hilly"));
    }

    #[test]
    fn test_format_pace() {
        assert_eq!(format_pace(300.0), "5:00/km");
        assert_eq!(format_pace(269.6), "4:30/km");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1500), "25:00");
        assert_eq!(format_duration(3725), "1:02:05");
    }
}
