// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout classification of past activities.
//!
//! An ordered table of `(predicate, label)` rules; the first rule that
//! matches wins and anything unmatched is endurance. Name keywords come
//! before physiological thresholds because a user-written title such as
//! "Intervalles 400m" is a stronger signal than heart rate.

use crate::models::{Activity, WorkoutType};

type Predicate = fn(&Activity) -> bool;

const RULES: &[(Predicate, WorkoutType)] = &[
    (|a: &Activity| name_has(a, &["interval", "fraction", "vma", "fartlek"]), WorkoutType::Intervals),
    (|a: &Activity| name_has(a, &["tempo", "seuil", "threshold"]), WorkoutType::Tempo),
    (|a: &Activity| name_has(a, &["recovery", "récup", "recup"]), WorkoutType::Recovery),
    (|a: &Activity| name_has(a, &["long run", "sortie longue"]), WorkoutType::Long),
    (|a: &Activity| minutes(a) >= 90.0, WorkoutType::Long),
    (|a: &Activity| hr(a).is_some_and(|hr| hr >= 170.0), WorkoutType::Intervals),
    (|a: &Activity| hr(a).is_some_and(|hr| hr >= 155.0) && minutes(a) <= 60.0, WorkoutType::Tempo),
    (|a: &Activity| a.speed_mps().is_some_and(|s| s >= 3.7), WorkoutType::Tempo),
    (|a: &Activity| hr(a).is_some_and(|hr| hr < 130.0) && minutes(a) <= 45.0, WorkoutType::Recovery),
];

fn name_has(activity: &Activity, keywords: &[&str]) -> bool {
    let name = activity.name.to_lowercase();
    keywords.iter().any(|k| name.contains(k))
}

fn minutes(activity: &Activity) -> f64 {
    activity.moving_time_seconds as f64 / 60.0
}

fn hr(activity: &Activity) -> Option<f64> {
    activity.average_heartrate
}

/// Classify one activity into a workout type.
pub fn classify(activity: &Activity) -> WorkoutType {
    RULES
        .iter()
        .find(|(matches, _)| matches(activity))
        .map(|(_, label)| *label)
        .unwrap_or(WorkoutType::Endurance)
}
