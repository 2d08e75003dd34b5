// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stride_dashboard::config::Config;
use stride_dashboard::db::FirestoreDb;
use stride_dashboard::middleware::auth::create_jwt;
use stride_dashboard::models::Activity;
use stride_dashboard::routes::create_router;
use stride_dashboard::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique athlete ID so emulator tests do not see each other's documents.
#[allow(dead_code)]
pub fn unique_athlete_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        % 1_000_000_000_000
}

#[allow(dead_code)]
pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

/// Minimal run owned by `athlete_id`.
#[allow(dead_code)]
pub fn test_run(id: u64, athlete_id: u64, start: &str, distance_meters: f64) -> Activity {
    let start = parse_time(start);
    Activity {
        strava_activity_id: id,
        athlete_id,
        name: format!("Run {}", id),
        activity_type: "Run".to_string(),
        distance_meters,
        moving_time_seconds: (distance_meters * 0.3) as u32,
        elapsed_time_seconds: (distance_meters * 0.32) as u32,
        elevation_gain_meters: 12.0,
        start_date: start,
        start_date_local: start.naive_utc(),
        average_heartrate: None,
        max_heartrate: None,
        average_speed: None,
        max_speed: None,
        calories: None,
        location: None,
        effort_rating: None,
        notes: None,
        synced_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

/// App over an offline database with the test config.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, FirestoreDb::new_mock()).unwrap());
    (create_router(state.clone()), state)
}

/// Session token accepted by the test app.
#[allow(dead_code)]
pub fn test_jwt(athlete_id: u64) -> String {
    create_jwt(athlete_id, &Config::test_default().jwt_signing_key).unwrap()
}

/// Decode a JSON response body.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
