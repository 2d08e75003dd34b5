// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::recommendation::release_activity;
use crate::models::records::PersonalRecord;
use crate::models::stats::aggregate;
use crate::models::{
    Activity, BestEffort, DateRange, MonthlyGoal, RaceTarget, SyncState, TrainingSettings,
};
use crate::services::SyncReport;
use crate::time_utils::{month_key, parse_month_key};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/account", delete(delete_account))
        .route("/api/activities", get(get_activities))
        .route(
            "/api/activities/{id}",
            get(get_activity)
                .patch(update_activity)
                .delete(delete_activity),
        )
        .route("/api/records", get(get_records))
        .route("/api/sync", post(trigger_sync))
        .route("/api/sync/status", get(get_sync_status))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/goals/{month}", get(get_goal).put(put_goal))
}

// ─── User Profile ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub profile_picture: Option<String>,
    pub location: Option<String>,
    pub coach_enabled: bool,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.athlete_id)))?;

    Ok(Json(UserResponse {
        athlete_id: profile.strava_athlete_id,
        firstname: profile.firstname,
        lastname: profile.lastname,
        profile_picture: profile.profile_picture,
        location: profile.location,
        coach_enabled: state.coach_service.is_enabled(),
    }))
}

// ─── Account Deletion ────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub documents_deleted: usize,
}

/// Delete the account and every stored document.
///
/// Tokens go first so no sync can start while the rest is removed. Strava
/// deauthorization is best effort.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    let athlete_id = user.athlete_id;
    tracing::info!(athlete_id, "User-initiated account deletion");

    let access_token = state.strava_service.revoke_local_tokens(athlete_id).await?;
    let documents_deleted = state.db.delete_user_data(athlete_id).await?;
    state.sync_service.guard().forget(athlete_id);

    if let Some(token) = access_token {
        if let Err(e) = state.strava_service.deauthorize_with_token(&token).await {
            tracing::warn!(athlete_id, error = %e, "Strava deauthorization failed");
        }
    }

    tracing::info!(athlete_id, documents_deleted, "Account deleted");

    Ok(Json(DeleteAccountResponse {
        success: true,
        documents_deleted,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Only activities starting after this instant (RFC3339)
    after: Option<String>,
    /// 1-indexed
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;

fn parse_after_timestamp(after: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    after
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::BadRequest(
                        "Invalid 'after' parameter: must be RFC3339 datetime".to_string(),
                    )
                })
        })
        .transpose()
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
}

async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    if params.page < 1 {
        return Err(AppError::BadRequest(
            "Invalid 'page' parameter: must be >= 1".to_string(),
        ));
    }
    let per_page = params.per_page.clamp(1, MAX_PER_PAGE);
    let after = parse_after_timestamp(params.after.as_deref())?;
    let offset = (params.page - 1).saturating_mul(per_page);

    // One extra row tells whether another page exists.
    let mut activities = state
        .db
        .get_activities_for_user(user.athlete_id, after, per_page + 1, offset)
        .await?;
    let has_more = activities.len() > per_page as usize;
    activities.truncate(per_page as usize);

    Ok(Json(ActivitiesResponse {
        activities,
        page: params.page,
        per_page,
        has_more,
    }))
}

async fn owned_activity(state: &AppState, athlete_id: u64, activity_id: u64) -> Result<Activity> {
    state
        .db
        .get_activity(activity_id)
        .await?
        .filter(|a| a.athlete_id == athlete_id)
        .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityDetailResponse {
    pub activity: Activity,
    pub best_efforts: Vec<BestEffort>,
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<ActivityDetailResponse>> {
    let activity = owned_activity(&state, user.athlete_id, activity_id).await?;
    let best_efforts = state.db.get_best_efforts_for_activity(activity_id).await?;
    Ok(Json(ActivityDetailResponse {
        activity,
        best_efforts,
    }))
}

/// User annotations. Absent fields are left unchanged; an empty note clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateActivityRequest {
    #[validate(range(min = 1, max = 10, message = "Effort rating must be between 1 and 10"))]
    pub effort_rating: Option<u8>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
    Json(body): Json<UpdateActivityRequest>,
) -> Result<Json<Activity>> {
    body.validate()?;

    let mut activity = owned_activity(&state, user.athlete_id, activity_id).await?;
    if let Some(rating) = body.effort_rating {
        activity.effort_rating = Some(rating);
    }
    if let Some(notes) = body.notes {
        let notes = notes.trim();
        activity.notes = (!notes.is_empty()).then(|| notes.to_string());
    }
    state.db.set_activity(&activity).await?;

    tracing::debug!(
        athlete_id = user.athlete_id,
        activity_id,
        "Activity annotations updated"
    );
    Ok(Json(activity))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteActivityResponse {
    pub success: bool,
    pub recommendations_released: usize,
    pub personal_records: usize,
}

/// Delete an activity with its best efforts, release linked
/// recommendations, then rebuild personal records.
async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<DeleteActivityResponse>> {
    owned_activity(&state, user.athlete_id, activity_id).await?;

    let mut linked: Vec<_> = state
        .db
        .get_recommendations_for_activity(activity_id)
        .await?
        .into_iter()
        .filter(|r| r.athlete_id == user.athlete_id)
        .collect();
    let changed = release_activity(
        &mut linked,
        activity_id,
        Utc::now().date_naive(),
        &Utc::now().to_rfc3339(),
    );
    let released: Vec<_> = changed.iter().map(|&i| linked[i].clone()).collect();

    state
        .db
        .delete_activity_cascade(activity_id, &released)
        .await?;
    let personal_records = state
        .sync_service
        .recompute_personal_records(user.athlete_id)
        .await?;

    Ok(Json(DeleteActivityResponse {
        success: true,
        recommendations_released: released.len(),
        personal_records,
    }))
}

// ─── Personal Records ────────────────────────────────────────

async fn get_records(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PersonalRecord>>> {
    Ok(Json(state.db.get_personal_records(user.athlete_id).await?))
}

// ─── Sync ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SyncQuery {
    #[serde(default)]
    full: bool,
}

async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<SyncReport>> {
    Ok(Json(
        state
            .sync_service
            .sync(user.athlete_id, params.full)
            .await?,
    ))
}

async fn get_sync_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncState>> {
    Ok(Json(
        state
            .db
            .get_sync_state(user.athlete_id)
            .await?
            .unwrap_or_else(|| SyncState::new(user.athlete_id)),
    ))
}

// ─── Training Settings ───────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RaceTargetRequest {
    #[validate(length(min = 1, max = 100, message = "Race name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub distance_label: String,
    pub race_date: NaiveDate,
    #[validate(range(min = 1))]
    pub target_time_seconds: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(range(min = 1, max = 14, message = "Weekly frequency must be between 1 and 14"))]
    pub weekly_frequency: u8,
    #[validate(nested)]
    pub race_target: Option<RaceTargetRequest>,
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TrainingSettings>> {
    Ok(Json(
        state
            .db
            .get_settings(user.athlete_id)
            .await?
            .unwrap_or_else(|| TrainingSettings::default_for(user.athlete_id)),
    ))
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<TrainingSettings>> {
    body.validate()?;

    let settings = TrainingSettings {
        athlete_id: user.athlete_id,
        race_target: body.race_target.map(|r| RaceTarget {
            name: r.name.trim().to_string(),
            distance_label: r.distance_label.trim().to_string(),
            race_date: r.race_date,
            target_time_seconds: r.target_time_seconds,
        }),
        weekly_frequency: body.weekly_frequency,
        updated_at: Utc::now().to_rfc3339(),
    };
    state.db.set_settings(&settings).await?;

    Ok(Json(settings))
}

// ─── Monthly Goals ───────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[validate(range(min = 0.0, max = 10_000_000.0))]
    pub distance_goal_meters: f64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GoalResponse {
    pub month: String,
    /// `None` when no goal was set for the month
    pub distance_goal_meters: Option<f64>,
    pub completed_meters: f64,
}

/// Canonical "YYYY-MM" key and date range for a month path segment.
fn month_range(month: &str) -> Result<(String, DateRange)> {
    parse_month_key(month)
        .and_then(|(year, m)| DateRange::month(year, m).map(|r| (month_key(year, m), r)))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid month '{}', expected YYYY-MM", month)))
}

async fn goal_response(
    state: &AppState,
    athlete_id: u64,
    month: String,
    range: &DateRange,
    goal: Option<&MonthlyGoal>,
) -> Result<GoalResponse> {
    let activities = state
        .db
        .get_activities_in_range(athlete_id, &range.storage_window())
        .await?;
    Ok(GoalResponse {
        month,
        distance_goal_meters: goal.map(|g| g.distance_goal_meters),
        completed_meters: aggregate(&activities, athlete_id, range).total_distance_meters,
    })
}

async fn get_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(month): Path<String>,
) -> Result<Json<GoalResponse>> {
    let (month, range) = month_range(&month)?;
    let goal = state.db.get_goal(user.athlete_id, &month).await?;
    Ok(Json(
        goal_response(&state, user.athlete_id, month, &range, goal.as_ref()).await?,
    ))
}

async fn put_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(month): Path<String>,
    Json(body): Json<UpdateGoalRequest>,
) -> Result<Json<GoalResponse>> {
    body.validate()?;
    let (month, range) = month_range(&month)?;

    let goal = MonthlyGoal {
        athlete_id: user.athlete_id,
        month: month.clone(),
        distance_goal_meters: body.distance_goal_meters,
        updated_at: Utc::now().to_rfc3339(),
    };
    state.db.set_goal(&goal).await?;

    Ok(Json(
        goal_response(&state, user.athlete_id, month, &range, Some(&goal)).await?,
    ))
}
