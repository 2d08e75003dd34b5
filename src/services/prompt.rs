// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training-load heuristics and prompt assembly for the coach.

use chrono::NaiveDate;
use std::fmt::Write as _;

use crate::config::CoachTuning;
use crate::models::activity::{format_duration, format_pace};
use crate::models::{Activity, TrainingSettings, WorkoutType};
use crate::services::classifier::classify;

pub const SYSTEM_PROMPT: &str = "You are an experienced running coach. You design safe, \
progressive training sessions from an athlete's recent history. Always answer with a single \
JSON object and nothing else.";

/// How the recent mix of workouts looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutBalance {
    TooIntense,
    NoIntensity,
    NoLongRun,
    Balanced,
}

impl WorkoutBalance {
    pub fn label(&self) -> &'static str {
        match self {
            WorkoutBalance::TooIntense => {
                "too much intensity recently; favour easy or recovery running"
            }
            WorkoutBalance::NoIntensity => "no quality sessions recently; add some intensity",
            WorkoutBalance::NoLongRun => "no long run recently; include one",
            WorkoutBalance::Balanced => "balanced",
        }
    }
}

/// Runs only, newest first.
fn recent_runs(history: &[Activity]) -> Vec<&Activity> {
    let mut runs: Vec<&Activity> = history.iter().filter(|a| a.is_run()).collect();
    runs.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    runs
}

/// Mean of the latest effort ratings, or the neutral default without any.
pub fn fatigue_score(history: &[Activity], tuning: &CoachTuning) -> f64 {
    let ratings: Vec<f64> = recent_runs(history)
        .into_iter()
        .filter_map(|a| a.effort_rating)
        .take(tuning.fatigue_window)
        .map(f64::from)
        .collect();

    if ratings.is_empty() {
        return tuning.neutral_fatigue;
    }
    ratings.iter().sum::<f64>() / ratings.len() as f64
}

pub fn workout_balance(history: &[Activity], tuning: &CoachTuning) -> WorkoutBalance {
    let types: Vec<WorkoutType> = recent_runs(history).into_iter().map(classify).collect();
    let total = types.len();
    if total == 0 {
        return WorkoutBalance::Balanced;
    }

    let count = |wanted: &[WorkoutType]| types.iter().filter(|t| wanted.contains(t)).count();
    let intensity = count(&[WorkoutType::Intervals, WorkoutType::Tempo]);
    let long = count(&[WorkoutType::Long]);

    if intensity as f64 / total as f64 > tuning.max_intensity_share {
        WorkoutBalance::TooIntense
    } else if total >= tuning.min_runs_for_balance && intensity == 0 {
        WorkoutBalance::NoIntensity
    } else if total >= tuning.min_runs_for_balance && long == 0 {
        WorkoutBalance::NoLongRun
    } else {
        WorkoutBalance::Balanced
    }
}

fn summarize(activity: &Activity) -> String {
    let mut line = format!(
        "- {}: \"{}\", {:.1} km in {}",
        activity.start_date_local.date(),
        activity.name,
        activity.distance_meters / 1000.0,
        format_duration(activity.moving_time_seconds),
    );
    if let Some(pace) = activity.pace_seconds_per_km() {
        let _ = write!(line, " ({})", format_pace(pace));
    }
    if let Some(hr) = activity.average_heartrate {
        let _ = write!(line, ", avg HR {:.0}", hr);
    }
    let _ = write!(line, ", type {}", classify(activity));
    if let Some(rating) = activity.effort_rating {
        let _ = write!(line, ", felt {}/10", rating);
    }
    line
}

/// Build the user prompt for one generation request.
pub fn assemble_prompt(
    history: &[Activity],
    settings: &TrainingSettings,
    planned_date: NaiveDate,
    tuning: &CoachTuning,
) -> String {
    let runs = recent_runs(history);
    let fatigue = fatigue_score(history, tuning);
    let balance = workout_balance(history, tuning);

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Recent runs (newest first):");
    for activity in runs.iter().take(tuning.history_size) {
        let _ = writeln!(prompt, "{}", summarize(activity));
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Fatigue score (1-10, from perceived effort): {:.1}", fatigue);
    let _ = writeln!(prompt, "Workout balance: {}", balance.label());
    let _ = writeln!(
        prompt,
        "Planned training frequency: {} sessions per week",
        settings.weekly_frequency
    );

    match &settings.race_target {
        Some(race) => {
            let _ = write!(
                prompt,
                "Race target: {} ({}) on {}",
                race.name, race.distance_label, race.race_date
            );
            if let Some(target) = race.target_time_seconds {
                let _ = write!(prompt, ", goal time {}", format_duration(target));
            }
            let weeks = (race.race_date - planned_date).num_days() / 7;
            let _ = writeln!(prompt, ", {} weeks away", weeks.max(0));
        }
        None => {
            let _ = writeln!(prompt, "Race target: none, general fitness");
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Suggest {} different sessions for {}. Respond with a JSON object of the form \
         {{\"recommendations\": [{{\"type\": \"intervals|tempo|recovery|long|endurance\", \
         \"title\": string, \"description\": string, \"duration\": minutes, \
         \"intensity\": \"low|moderate|high\", \"warmup\": string, \"mainSet\": string, \
         \"cooldown\": string, \"justification\": string}}]}}.",
        tuning.recommendations_per_request,
        planned_date
    );

    prompt
}
