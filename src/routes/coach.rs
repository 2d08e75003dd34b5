// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coach recommendation routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Recommendation;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/recommendations", get(list_recommendations))
        .route(
            "/api/recommendations/generate",
            post(generate_recommendations),
        )
        .route(
            "/api/recommendations/{id}/link",
            post(link_activity).delete(unlink_activity),
        )
}

async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Recommendation>>> {
    Ok(Json(
        state
            .coach_service
            .list(user.athlete_id, Utc::now().date_naive())
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    planned_date: Option<NaiveDate>,
}

/// Planned date from an optional JSON body. Defaults to tomorrow; past
/// dates are rejected.
fn planned_date(body: &[u8], today: NaiveDate) -> Result<NaiveDate> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let date = request
        .planned_date
        .unwrap_or(today + Duration::days(1));
    if date < today {
        return Err(AppError::BadRequest(format!(
            "planned_date {} is in the past",
            date
        )));
    }
    Ok(date)
}

async fn generate_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<Vec<Recommendation>>> {
    let today = Utc::now().date_naive();
    let date = planned_date(&body, today)?;

    Ok(Json(
        state
            .coach_service
            .generate(user.athlete_id, date, today)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct LinkRequest {
    activity_id: u64,
}

async fn link_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rec_id): Path<String>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<Recommendation>> {
    Ok(Json(
        state
            .coach_service
            .link(user.athlete_id, &rec_id, body.activity_id)
            .await?,
    ))
}

async fn unlink_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rec_id): Path<String>,
) -> Result<Json<Recommendation>> {
    Ok(Json(
        state
            .coach_service
            .unlink(user.athlete_id, &rec_id, Utc::now().date_naive())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_planned_date_defaults_to_tomorrow() {
        let today = day(2024, 12, 31);
        assert_eq!(planned_date(b"", today).unwrap(), day(2025, 1, 1));
        assert_eq!(planned_date(b"{}", today).unwrap(), day(2025, 1, 1));
        assert_eq!(planned_date(b"  \n", today).unwrap(), day(2025, 1, 1));
    }

    #[test]
    fn test_planned_date_explicit() {
        let today = day(2024, 6, 1);
        let body = br#"{"planned_date": "2024-06-01"}"#;
        assert_eq!(planned_date(body, today).unwrap(), today);
    }

    #[test]
    fn test_planned_date_rejects_past_and_garbage() {
        let today = day(2024, 6, 1);
        let past = br#"{"planned_date": "2024-05-31"}"#;
        assert!(matches!(
            planned_date(past, today),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            planned_date(b"not json", today),
            Err(AppError::BadRequest(_))
        ));
    }
}
