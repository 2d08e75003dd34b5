// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coach: generation, listing and activity matching of recommendations.

use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashSet;

use crate::config::{CoachTuning, Config};
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::recommendation::{expire_overdue, fallback_plan};
use crate::models::{
    Activity, DateRange, MatchSource, Recommendation, RecommendationStatus, TrainingSettings,
    WorkoutPlan,
};
use crate::services::classifier::classify;
use crate::services::llm::{parse_recommendations, LlmClient, LlmError};
use crate::services::prompt::{assemble_prompt, SYSTEM_PROMPT};
use crate::time_utils::start_of_day;

/// Window of history used to judge whether a user can be coached.
pub const HISTORY_WINDOW_DAYS: i64 = 28;
/// Runs required in that window.
pub const MIN_RECENT_RUNS: usize = 3;

/// Plans from a completion, or the fallback plan when anything went wrong.
///
/// The flag is true when the fallback was used.
pub fn plans_or_fallback(completion: Result<String, LlmError>) -> (Vec<WorkoutPlan>, bool) {
    match completion.and_then(|text| parse_recommendations(&text)) {
        Ok(plans) => (plans, false),
        Err(e) => {
            tracing::warn!(error = %e, "Coach generation failed, serving fallback");
            (vec![fallback_plan()], true)
        }
    }
}

/// Pair pending recommendations with runs done on their planned day.
///
/// A run whose classified type equals the recommended type is preferred;
/// otherwise the earliest run that day is taken. An activity already linked
/// to any recommendation is never reused. Returns the indices changed.
pub fn auto_match(
    recommendations: &mut [Recommendation],
    activities: &[Activity],
    now: &str,
) -> Vec<usize> {
    let mut used: HashSet<u64> = recommendations
        .iter()
        .filter_map(|r| r.matched_activity_id)
        .collect();

    let mut order: Vec<usize> = (0..recommendations.len())
        .filter(|&i| recommendations[i].status == RecommendationStatus::Pending)
        .collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&recommendations[a], &recommendations[b]);
        ra.planned_date
            .cmp(&rb.planned_date)
            .then_with(|| ra.created_at.cmp(&rb.created_at))
    });

    let mut changed = Vec::new();
    for idx in order {
        let rec = &recommendations[idx];
        let mut candidates: Vec<&Activity> = activities
            .iter()
            .filter(|a| {
                a.athlete_id == rec.athlete_id
                    && a.is_run()
                    && a.start_date_local.date() == rec.planned_date
                    && !used.contains(&a.strava_activity_id)
            })
            .collect();
        candidates.sort_by_key(|a| a.start_date);

        let chosen = candidates
            .iter()
            .find(|a| classify(a) == rec.workout.workout_type)
            .or_else(|| candidates.first())
            .map(|a| a.strava_activity_id);

        if let Some(activity_id) = chosen {
            if recommendations[idx]
                .complete(activity_id, MatchSource::Automatic, now)
                .is_ok()
            {
                used.insert(activity_id);
                changed.push(idx);
            }
        }
    }
    changed
}

/// Coach service shared through AppState.
#[derive(Clone)]
pub struct CoachService {
    db: FirestoreDb,
    /// `None` when no API key is configured
    llm: Option<LlmClient>,
    tuning: CoachTuning,
}

impl CoachService {
    pub fn new(db: FirestoreDb, llm: Option<LlmClient>, tuning: CoachTuning) -> Self {
        Self { db, llm, tuning }
    }

    pub fn from_config(config: &Config, db: FirestoreDb) -> Result<Self, LlmError> {
        let llm = match &config.llm_api_key {
            Some(key) => Some(LlmClient::new(
                &config.llm_base_url,
                key.clone(),
                config.llm_model.clone(),
            )?),
            None => {
                tracing::warn!("LLM_API_KEY not set, coach disabled");
                None
            }
        };
        Ok(Self::new(db, llm, config.coach.clone()))
    }

    pub fn is_enabled(&self) -> bool {
        self.llm.is_some()
    }

    /// Generate and store recommendations for `planned_date`.
    ///
    /// Fails fast when the coach is disabled or the athlete has too little
    /// recent history. Any failure talking to the model yields the single
    /// fallback recommendation instead of an error.
    pub async fn generate(
        &self,
        athlete_id: u64,
        planned_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<Recommendation>, AppError> {
        let llm = self.llm.as_ref().ok_or(AppError::CoachUnavailable)?;

        let window = DateRange::new(
            start_of_day(today - Duration::days(HISTORY_WINDOW_DAYS)),
            start_of_day(today + Duration::days(1)),
        );
        let history = self.db.get_activities_in_range(athlete_id, &window).await?;
        let run_count = history.iter().filter(|a| a.is_run()).count();
        if run_count < MIN_RECENT_RUNS {
            return Err(AppError::InsufficientData(format!(
                "{} runs in the last {} days, at least {} needed",
                run_count, HISTORY_WINDOW_DAYS, MIN_RECENT_RUNS
            )));
        }

        let settings = self
            .db
            .get_settings(athlete_id)
            .await?
            .unwrap_or_else(|| TrainingSettings::default_for(athlete_id));

        let prompt = assemble_prompt(&history, &settings, planned_date, &self.tuning);
        let completion = llm
            .complete_json(
                SYSTEM_PROMPT,
                &prompt,
                self.tuning.temperature,
                self.tuning.max_tokens,
            )
            .await;
        let (plans, is_fallback) = plans_or_fallback(completion);

        let now = Utc::now();
        let stamp = now.to_rfc3339();
        let recs: Vec<Recommendation> = plans
            .into_iter()
            .take(self.tuning.recommendations_per_request.max(1))
            .enumerate()
            .map(|(i, plan)| {
                Recommendation::new(
                    format!("{}_{}_{}", athlete_id, now.timestamp_millis(), i),
                    athlete_id,
                    planned_date,
                    plan,
                    is_fallback,
                    &stamp,
                )
            })
            .collect();

        self.db.set_recommendations(&recs).await?;

        tracing::info!(
            athlete_id,
            count = recs.len(),
            is_fallback,
            "Recommendations generated"
        );

        Ok(recs)
    }

    /// All recommendations, with overdue ones expired first.
    pub async fn list(
        &self,
        athlete_id: u64,
        today: NaiveDate,
    ) -> Result<Vec<Recommendation>, AppError> {
        let mut recs = self.db.get_recommendations(athlete_id).await?;
        let changed = expire_overdue(&mut recs, today, &Utc::now().to_rfc3339());
        if !changed.is_empty() {
            let updated: Vec<Recommendation> = changed.iter().map(|&i| recs[i].clone()).collect();
            self.db.set_recommendations(&updated).await?;
            tracing::debug!(athlete_id, expired = updated.len(), "Expired overdue recommendations");
        }
        Ok(recs)
    }

    async fn owned_recommendation(
        &self,
        athlete_id: u64,
        rec_id: &str,
    ) -> Result<Recommendation, AppError> {
        self.db
            .get_recommendation(rec_id)
            .await?
            .filter(|r| r.athlete_id == athlete_id)
            .ok_or_else(|| AppError::NotFound(format!("Recommendation {}", rec_id)))
    }

    /// Manually link an activity to a recommendation.
    pub async fn link(
        &self,
        athlete_id: u64,
        rec_id: &str,
        activity_id: u64,
    ) -> Result<Recommendation, AppError> {
        let mut rec = self.owned_recommendation(athlete_id, rec_id).await?;

        self.db
            .get_activity(activity_id)
            .await?
            .filter(|a| a.athlete_id == athlete_id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if self
            .db
            .get_recommendations_for_activity(activity_id)
            .await?
            .iter()
            .any(|other| other.id != rec.id)
        {
            return Err(AppError::BadRequest(format!(
                "Activity {} is already linked to another recommendation",
                activity_id
            )));
        }

        rec.complete(activity_id, MatchSource::Manual, &Utc::now().to_rfc3339())?;
        self.db.set_recommendation(&rec).await?;

        tracing::info!(athlete_id, rec_id, activity_id, "Recommendation linked");
        Ok(rec)
    }

    /// Remove the activity link from a recommendation.
    pub async fn unlink(
        &self,
        athlete_id: u64,
        rec_id: &str,
        today: NaiveDate,
    ) -> Result<Recommendation, AppError> {
        let mut rec = self.owned_recommendation(athlete_id, rec_id).await?;
        rec.unlink(today, &Utc::now().to_rfc3339())?;
        self.db.set_recommendation(&rec).await?;

        tracing::info!(athlete_id, rec_id, status = %rec.status, "Recommendation unlinked");
        Ok(rec)
    }

    /// Match freshly synced runs, then expire what is still overdue.
    /// Returns how many recommendations were completed.
    pub async fn reconcile_after_sync(
        &self,
        athlete_id: u64,
        activities: &[Activity],
        today: NaiveDate,
    ) -> Result<usize, AppError> {
        let mut recs = self.db.get_recommendations(athlete_id).await?;
        let now = Utc::now().to_rfc3339();

        let matched = auto_match(&mut recs, activities, &now);
        let expired = expire_overdue(&mut recs, today, &now);

        let mut changed: Vec<usize> = matched.iter().chain(expired.iter()).copied().collect();
        changed.sort_unstable();
        changed.dedup();

        if !changed.is_empty() {
            let updated: Vec<Recommendation> = changed.iter().map(|&i| recs[i].clone()).collect();
            self.db.set_recommendations(&updated).await?;
        }

        Ok(matched.len())
    }
}
