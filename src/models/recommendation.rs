// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach recommendations and their lifecycle.
//!
//! A recommendation starts `pending`. It becomes `completed` once a real
//! activity is matched to it (automatically after a sync, or by the user),
//! and `expired` once its planned date passes without a match.

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Workout category shared by the classifier and generated plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum WorkoutType {
    Intervals,
    Tempo,
    Recovery,
    Long,
    Endurance,
}

impl WorkoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Intervals => "intervals",
            WorkoutType::Tempo => "tempo",
            WorkoutType::Recovery => "recovery",
            WorkoutType::Long => "long",
            WorkoutType::Endurance => "endurance",
        }
    }

    /// Lenient mapping for labels coming back from the language model.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.starts_with("interval") || label.contains("fraction") || label == "vma" {
            WorkoutType::Intervals
        } else if label.starts_with("tempo") || label.contains("seuil") || label == "threshold" {
            WorkoutType::Tempo
        } else if label.starts_with("recov") || label.contains("récup") || label.contains("recup")
        {
            WorkoutType::Recovery
        } else if label.starts_with("long") || label.contains("sortie longue") {
            WorkoutType::Long
        } else {
            WorkoutType::Endurance
        }
    }
}

impl From<String> for WorkoutType {
    fn from(label: String) -> Self {
        WorkoutType::from_label(&label)
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One suggested session, as returned by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WorkoutPlan {
    #[serde(rename = "type")]
    pub workout_type: WorkoutType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        alias = "duration",
        default,
        deserialize_with = "minutes_from_number_or_text"
    )]
    pub duration_minutes: u32,
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub warmup: String,
    #[serde(default, alias = "mainSet")]
    pub main_set: String,
    #[serde(default)]
    pub cooldown: String,
    #[serde(default)]
    pub justification: String,
}

/// Accepts `45`, `45.0`, `"45 min"`, `"1h30"`, `"1:15"` or `null` (zero,
/// as if the field were missing).
fn minutes_from_number_or_text<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Number(n)) if n >= 0.0 => Ok(n.round() as u32),
        Some(Raw::Number(n)) => Err(de::Error::custom(format!("negative duration: {}", n))),
        Some(Raw::Text(text)) => parse_minutes(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid duration: {:?}", text))),
    }
}

/// Minutes in free text. An `h` or `:` separates hours from minutes.
fn parse_minutes(text: &str) -> Option<u32> {
    let text = text.trim().to_lowercase();
    let leading = |s: &str| -> Option<u32> {
        s.trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok()
    };

    if let Some((hours, rest)) = text.split_once('h').or_else(|| text.split_once(':')) {
        if let Ok(hours) = hours.trim().parse::<u32>() {
            let minutes: String = rest
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect();
            return Some(hours * 60 + minutes.parse::<u32>().unwrap_or(0));
        }
    }
    leading(&text)
}

/// The single plan served when generation fails.
pub fn fallback_plan() -> WorkoutPlan {
    WorkoutPlan {
        workout_type: WorkoutType::Endurance,
        title: "Easy endurance run".to_string(),
        description: "A relaxed run at conversational pace to keep building your aerobic base."
            .to_string(),
        duration_minutes: 45,
        intensity: "low".to_string(),
        warmup: "10 minutes of easy jogging".to_string(),
        main_set: "30 minutes at a comfortable, conversational pace".to_string(),
        cooldown: "5 minutes of walking and light stretching".to_string(),
        justification: "Personalised suggestions are unavailable right now; an easy run is \
                        always a safe choice."
            .to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RecommendationStatus {
    Pending,
    Completed,
    Expired,
}

impl RecommendationStatus {
    pub fn can_transition_to(self, next: RecommendationStatus) -> bool {
        use RecommendationStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Expired) | (Expired, Completed)
                // unlinking
                | (Completed, Pending) | (Completed, Expired)
        )
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Completed => "completed",
            RecommendationStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum MatchSource {
    Automatic,
    Manual,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Cannot move recommendation from {from} to {to}")]
pub struct TransitionError {
    pub from: RecommendationStatus,
    pub to: RecommendationStatus,
}

/// Stored recommendation in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Recommendation {
    /// Document ID
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub planned_date: NaiveDate,
    pub workout: WorkoutPlan,
    pub status: RecommendationStatus,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub matched_activity_id: Option<u64>,
    #[serde(default)]
    pub match_source: Option<MatchSource>,
    /// True when this is the canned plan served after a generation failure
    #[serde(default)]
    pub is_fallback: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Recommendation {
    pub fn new(
        id: String,
        athlete_id: u64,
        planned_date: NaiveDate,
        workout: WorkoutPlan,
        is_fallback: bool,
        now: &str,
    ) -> Self {
        Self {
            id,
            athlete_id,
            planned_date,
            workout,
            status: RecommendationStatus::Pending,
            matched_activity_id: None,
            match_source: None,
            is_fallback,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    fn transition(&mut self, next: RecommendationStatus, now: &str) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now.to_string();
        Ok(())
    }

    /// Link a real activity and mark the recommendation completed.
    pub fn complete(
        &mut self,
        activity_id: u64,
        source: MatchSource,
        now: &str,
    ) -> Result<(), TransitionError> {
        self.transition(RecommendationStatus::Completed, now)?;
        self.matched_activity_id = Some(activity_id);
        self.match_source = Some(source);
        Ok(())
    }

    /// Remove the activity link. Goes back to pending, or expired if the
    /// planned date is already behind `today`.
    pub fn unlink(&mut self, today: NaiveDate, now: &str) -> Result<(), TransitionError> {
        let next = if self.planned_date < today {
            RecommendationStatus::Expired
        } else {
            RecommendationStatus::Pending
        };
        self.transition(next, now)?;
        self.matched_activity_id = None;
        self.match_source = None;
        Ok(())
    }

    /// Whether a pending recommendation's date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == RecommendationStatus::Pending && self.planned_date < today
    }
}

/// Expire every overdue pending recommendation. Returns the indices changed.
pub fn expire_overdue(
    recommendations: &mut [Recommendation],
    today: NaiveDate,
    now: &str,
) -> Vec<usize> {
    let mut changed = Vec::new();
    for (idx, rec) in recommendations.iter_mut().enumerate() {
        if rec.is_overdue(today) && rec.transition(RecommendationStatus::Expired, now).is_ok() {
            changed.push(idx);
        }
    }
    changed
}

/// Unlink every recommendation that points at a deleted activity.
/// Returns the indices changed.
pub fn release_activity(
    recommendations: &mut [Recommendation],
    activity_id: u64,
    today: NaiveDate,
    now: &str,
) -> Vec<usize> {
    let mut changed = Vec::new();
    for (idx, rec) in recommendations.iter_mut().enumerate() {
        if rec.matched_activity_id == Some(activity_id) && rec.unlink(today, now).is_ok() {
            changed.push(idx);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: &str) -> Recommendation {
        Recommendation::new(
            "r1".to_string(),
            12345,
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            fallback_plan(),
            false,
            "2024-01-01T00:00:00Z",
        )
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_workout_type_from_label() {
        assert_eq!(WorkoutType::from_label("Intervals"), WorkoutType::Intervals);
        assert_eq!(WorkoutType::from_label("fractionné"), WorkoutType::Intervals);
        assert_eq!(WorkoutType::from_label("tempo run"), WorkoutType::Tempo);
        assert_eq!(WorkoutType::from_label("recovery"), WorkoutType::Recovery);
        assert_eq!(WorkoutType::from_label("long run"), WorkoutType::Long);
        assert_eq!(WorkoutType::from_label("easy"), WorkoutType::Endurance);
    }

    #[test]
    fn test_plan_accepts_model_field_names() {
        let json = r#"{
            "type": "intervals",
            "title": "8x400m",
            "description": "Short repeats",
            "duration": "50 min",
            "intensity": "high",
            "warmup": "15 min easy",
            "mainSet": "8x400m @ 5k pace",
            "cooldown": "10 min easy",
            "justification": "Speed work is missing"
        }"#;

        let plan: WorkoutPlan = serde_json::from_str(json).unwrap();

        assert_eq!(plan.workout_type, WorkoutType::Intervals);
        assert_eq!(plan.duration_minutes, 50);
        assert_eq!(plan.main_set, "8x400m @ 5k pace");
    }

    #[test]
    fn test_plan_numeric_duration_and_missing_fields() {
        let json = r#"{"type": "long", "title": "Long run", "duration": 95}"#;
        let plan: WorkoutPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.duration_minutes, 95);
        assert_eq!(plan.workout_type, WorkoutType::Long);
        assert!(plan.warmup.is_empty());
    }

    #[test]
    fn test_plan_duration_in_hours() {
        let cases = [
            ("\"1h30\"", 90),
            ("\"1 h 15 min\"", 75),
            ("\"2 hours\"", 120),
            ("\"1:10\"", 70),
            ("\"45-50 min\"", 45),
            ("\"30 min with hills\"", 30),
            ("null", 0),
        ];
        for (duration, minutes) in cases {
            let json = format!(
                r#"{{"type": "long", "title": "Long run", "duration": {}}}"#,
                duration
            );
            let plan: WorkoutPlan = serde_json::from_str(&json).unwrap();
            assert_eq!(plan.duration_minutes, minutes, "duration {}", duration);
        }
    }

    #[test]
    fn test_plan_rejects_unreadable_duration() {
        let json = r#"{"type": "long", "title": "Long run", "duration": "about an hour"}"#;
        assert!(serde_json::from_str::<WorkoutPlan>(json).is_err());
    }

    #[test]
    fn test_plan_serializes_with_stored_names() {
        let value = serde_json::to_value(fallback_plan()).unwrap();
        assert_eq!(value["type"], "endurance");
        assert_eq!(value["duration_minutes"], 45);
        assert!(value.get("main_set").is_some());
    }

    #[test]
    fn test_complete_then_unlink() {
        let mut r = rec("2024-01-10");
        r.complete(99, MatchSource::Manual, "now").unwrap();
        assert_eq!(r.status, RecommendationStatus::Completed);
        assert_eq!(r.matched_activity_id, Some(99));

        r.unlink(day("2024-01-09"), "later").unwrap();
        assert_eq!(r.status, RecommendationStatus::Pending);
        assert!(r.matched_activity_id.is_none());
        assert!(r.match_source.is_none());
    }

    #[test]
    fn test_unlink_after_planned_date_expires() {
        let mut r = rec("2024-01-10");
        r.complete(99, MatchSource::Automatic, "now").unwrap();
        r.unlink(day("2024-01-12"), "later").unwrap();
        assert_eq!(r.status, RecommendationStatus::Expired);
    }

    #[test]
    fn test_unlink_pending_is_rejected() {
        let mut r = rec("2024-01-10");
        let err = r.unlink(day("2024-01-09"), "later").unwrap_err();
        assert_eq!(err.from, RecommendationStatus::Pending);
    }

    #[test]
    fn test_expired_can_be_completed_manually() {
        let mut r = rec("2024-01-10");
        let mut recs = vec![r.clone()];
        assert_eq!(expire_overdue(&mut recs, day("2024-01-11"), "now"), vec![0]);
        r = recs.remove(0);
        assert_eq!(r.status, RecommendationStatus::Expired);

        r.complete(7, MatchSource::Manual, "now").unwrap();
        assert_eq!(r.status, RecommendationStatus::Completed);
    }

    #[test]
    fn test_expire_overdue_leaves_today_and_completed() {
        let mut today = rec("2024-01-11");
        today.id = "today".to_string();
        let mut done = rec("2024-01-01");
        done.complete(1, MatchSource::Automatic, "now").unwrap();
        let mut recs = vec![today, done];

        let changed = expire_overdue(&mut recs, day("2024-01-11"), "now");

        assert!(changed.is_empty());
        assert_eq!(recs[0].status, RecommendationStatus::Pending);
        assert_eq!(recs[1].status, RecommendationStatus::Completed);
    }

    #[test]
    fn test_release_activity() {
        let mut linked = rec("2024-01-05");
        linked.complete(99, MatchSource::Automatic, "now").unwrap();
        let mut other = rec("2024-01-12");
        other.id = "r2".to_string();
        other.complete(100, MatchSource::Manual, "now").unwrap();
        let mut recs = vec![linked, other];

        let changed = release_activity(&mut recs, 99, day("2024-01-10"), "later");

        assert_eq!(changed, vec![0]);
        assert_eq!(recs[0].status, RecommendationStatus::Expired);
        assert_eq!(recs[1].matched_activity_id, Some(100));
    }
}
