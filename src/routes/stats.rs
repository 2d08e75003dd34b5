// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Statistics routes. All figures are computed on request from stored
//! activities.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::stats::{
    calendar_month, monthly_totals, weekly_totals, CalendarDay, MonthTotal, WeekTotal,
};
use crate::models::{DashboardStats, DateRange};
use crate::time_utils::{iso_week_start, month_key, start_of_day};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_WEEKS: u32 = 12;
const MAX_WEEKS: u32 = 104;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats/dashboard", get(get_dashboard))
        .route("/api/stats/monthly", get(get_monthly))
        .route("/api/stats/weekly", get(get_weekly))
        .route("/api/stats/calendar", get(get_calendar))
}

#[derive(Deserialize)]
struct DashboardQuery {
    /// Reference day, defaults to today (UTC)
    date: Option<NaiveDate>,
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardStats>> {
    let today = params.date.unwrap_or_else(|| Utc::now().date_naive());

    let activities = state.db.get_all_activities(user.athlete_id).await?;
    let goal = state
        .db
        .get_goal(user.athlete_id, &month_key(today.year(), today.month()))
        .await?;

    Ok(Json(DashboardStats::compute(
        &activities,
        user.athlete_id,
        today,
        goal.as_ref(),
    )))
}

#[derive(Deserialize)]
struct MonthlyQuery {
    year: Option<i32>,
}

async fn get_monthly(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<MonthlyQuery>,
) -> Result<Json<Vec<MonthTotal>>> {
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    let range = DateRange::year(year)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid year {}", year)))?;

    let activities = state
        .db
        .get_activities_in_range(user.athlete_id, &range.storage_window())
        .await?;
    Ok(Json(monthly_totals(&activities, user.athlete_id, year)))
}

#[derive(Deserialize)]
struct WeeklyQuery {
    weeks: Option<u32>,
}

/// Query window covering the last `weeks` ISO weeks up to `today`.
fn weeks_window(today: NaiveDate, weeks: u32) -> DateRange {
    let current = iso_week_start(today);
    DateRange::new(
        start_of_day(current - Duration::weeks(weeks as i64 - 1)),
        start_of_day(current + Duration::weeks(1)),
    )
}

async fn get_weekly(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<WeeklyQuery>,
) -> Result<Json<Vec<WeekTotal>>> {
    let weeks = params.weeks.unwrap_or(DEFAULT_WEEKS);
    if weeks == 0 || weeks > MAX_WEEKS {
        return Err(AppError::BadRequest(format!(
            "'weeks' must be between 1 and {}",
            MAX_WEEKS
        )));
    }

    let today = Utc::now().date_naive();
    let activities = state
        .db
        .get_activities_in_range(
            user.athlete_id,
            &weeks_window(today, weeks).storage_window(),
        )
        .await?;
    Ok(Json(weekly_totals(
        &activities,
        user.athlete_id,
        today,
        weeks,
    )))
}

#[derive(Deserialize)]
struct CalendarQuery {
    year: Option<i32>,
    month: Option<u32>,
}

async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>> {
    let now = Utc::now();
    let year = params.year.unwrap_or_else(|| now.year());
    let month = params.month.unwrap_or_else(|| now.month());

    let range = DateRange::month(year, month).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid calendar month {}-{}", year, month))
    })?;

    let activities = state
        .db
        .get_activities_in_range(user.athlete_id, &range.storage_window())
        .await?;

    Ok(Json(calendar_month(
        &activities,
        user.athlete_id,
        year,
        month,
    )))
}
