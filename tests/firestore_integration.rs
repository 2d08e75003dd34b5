// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); without it they return early.

use chrono::NaiveDate;
use stride_dashboard::models::recommendation::{fallback_plan, release_activity};
use stride_dashboard::models::records::extract_personal_records;
use stride_dashboard::models::settings::MonthlyGoal;
use stride_dashboard::models::user::{User, UserTokens};
use stride_dashboard::models::{
    BestEffort, DateRange, MatchSource, Recommendation, RecommendationStatus, SyncState,
    TrainingSettings,
};

mod common;
use common::{parse_time, test_db, test_run, unique_athlete_id};

fn test_user(athlete_id: u64) -> User {
    User {
        strava_athlete_id: athlete_id,
        email: None,
        firstname: "Test".to_string(),
        lastname: "Runner".to_string(),
        profile_picture: None,
        location: Some("Lyon, France".to_string()),
        created_at: "2024-01-15T10:00:00Z".to_string(),
        last_active: "2024-01-15T10:00:00Z".to_string(),
    }
}

fn effort(id: u64, activity_id: u64, athlete_id: u64, distance: f64, secs: u32) -> BestEffort {
    BestEffort {
        best_effort_id: id,
        activity_id,
        athlete_id,
        name: format!("{}m", distance),
        distance_meters: distance,
        moving_time_seconds: secs,
        elapsed_time_seconds: secs,
        start_date: parse_time("2024-05-01T07:00:00Z"),
        activity_name: "Run".to_string(),
        location: None,
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_user_and_tokens_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();

    assert!(db.get_user(athlete_id).await.unwrap().is_none());
    db.upsert_user(&test_user(athlete_id)).await.unwrap();
    let fetched = db.get_user(athlete_id).await.unwrap().unwrap();
    assert_eq!(fetched.location.as_deref(), Some("Lyon, France"));

    let tokens = UserTokens {
        access_token_encrypted: "enc-access".to_string(),
        refresh_token_encrypted: "enc-refresh".to_string(),
        expires_at: "2030-01-01T00:00:00Z".to_string(),
        scopes: vec!["read".to_string(), "activity:read_all".to_string()],
    };
    db.set_tokens(athlete_id, &tokens).await.unwrap();
    assert_eq!(
        db.get_tokens(athlete_id).await.unwrap().unwrap().scopes,
        tokens.scopes
    );

    db.delete_tokens(athlete_id).await.unwrap();
    assert!(db.get_tokens(athlete_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_resync_preserves_annotations_and_replaces_efforts() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();
    let activity_id = athlete_id + 1;

    let run = test_run(activity_id, athlete_id, "2024-05-01T07:00:00Z", 10_000.0);
    db.upsert_synced_activity(
        &run,
        Some(&[
            effort(activity_id * 10, activity_id, athlete_id, 1000.0, 250),
            effort(activity_id * 10 + 1, activity_id, athlete_id, 5000.0, 1400),
        ]),
    )
    .await
    .unwrap();

    let mut annotated = db.get_activity(activity_id).await.unwrap().unwrap();
    annotated.effort_rating = Some(8);
    annotated.notes = Some("Windy".to_string());
    db.set_activity(&annotated).await.unwrap();

    // Strava renamed the run and dropped the 1k effort.
    let mut resynced = run.clone();
    resynced.name = "Renamed".to_string();
    db.upsert_synced_activity(
        &resynced,
        Some(&[effort(activity_id * 10 + 1, activity_id, athlete_id, 5000.0, 1390)]),
    )
    .await
    .unwrap();

    let stored = db.get_activity(activity_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.effort_rating, Some(8));
    assert_eq!(stored.notes.as_deref(), Some("Windy"));

    let efforts = db.get_best_efforts_for_activity(activity_id).await.unwrap();
    assert_eq!(efforts.len(), 1);
    assert_eq!(efforts[0].moving_time_seconds, 1390);
}

#[tokio::test]
async fn test_summary_only_resync_keeps_efforts() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();
    let activity_id = athlete_id + 2;

    let run = test_run(activity_id, athlete_id, "2024-05-01T07:00:00Z", 10_000.0);
    db.upsert_synced_activity(
        &run,
        Some(&[
            effort(activity_id * 10, activity_id, athlete_id, 1000.0, 250),
            effort(activity_id * 10 + 1, activity_id, athlete_id, 5000.0, 1400),
        ]),
    )
    .await
    .unwrap();

    let mut resynced = run.clone();
    resynced.name = "Renamed".to_string();
    db.upsert_synced_activity(&resynced, None).await.unwrap();

    assert_eq!(db.get_activity(activity_id).await.unwrap().unwrap().name, "Renamed");
    assert_eq!(
        db.get_best_efforts_for_activity(activity_id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_activity_range_and_pagination() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();

    for (i, start) in [
        "2024-04-30T23:59:59Z",
        "2024-05-01T00:00:00Z",
        "2024-05-15T12:00:00Z",
        "2024-06-01T00:00:00Z",
    ]
    .iter()
    .enumerate()
    {
        let run = test_run(athlete_id + i as u64, athlete_id, start, 5000.0);
        db.upsert_synced_activity(&run, Some(&[])).await.unwrap();
    }

    let may = DateRange::month(2024, 5).unwrap();
    let in_may = db.get_activities_in_range(athlete_id, &may).await.unwrap();
    assert_eq!(in_may.len(), 2);
    assert!(in_may[0].start_date < in_may[1].start_date);

    let first_page = db
        .get_activities_for_user(athlete_id, None, 3, 0)
        .await
        .unwrap();
    assert_eq!(first_page.len(), 3);
    assert_eq!(first_page[0].start_date, parse_time("2024-06-01T00:00:00Z"));

    let second_page = db
        .get_activities_for_user(athlete_id, None, 3, 3)
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);

    let after = db
        .get_activities_for_user(athlete_id, Some(parse_time("2024-05-01T00:00:00Z")), 10, 0)
        .await
        .unwrap();
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_personal_records_swap() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();

    let first = extract_personal_records(
        athlete_id,
        &[
            effort(1, 10, athlete_id, 1000.0, 240),
            effort(2, 10, athlete_id, 5000.0, 1300),
        ],
    );
    db.replace_personal_records(athlete_id, &first).await.unwrap();
    assert_eq!(db.get_personal_records(athlete_id).await.unwrap().len(), 2);

    // The 5km effort went away with its activity.
    let second = extract_personal_records(athlete_id, &[effort(1, 10, athlete_id, 1000.0, 240)]);
    db.replace_personal_records(athlete_id, &second).await.unwrap();

    let records = db.get_personal_records(athlete_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].bucket, "1km");
    assert_eq!(records[0].moving_time_seconds, 240);
}

#[tokio::test]
async fn test_delete_activity_cascade_releases_recommendation() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();
    let activity_id = athlete_id + 7;

    let run = test_run(activity_id, athlete_id, "2024-05-01T07:00:00Z", 8000.0);
    db.upsert_synced_activity(
        &run,
        Some(&[effort(activity_id * 10, activity_id, athlete_id, 5000.0, 1500)]),
    )
    .await
    .unwrap();

    let mut rec = Recommendation::new(
        format!("{}_rec", athlete_id),
        athlete_id,
        day(2024, 5, 1),
        fallback_plan(),
        true,
        "2024-04-30T20:00:00Z",
    );
    rec.complete(activity_id, MatchSource::Automatic, "2024-05-01T09:00:00Z")
        .unwrap();
    db.set_recommendation(&rec).await.unwrap();

    let mut linked = db.get_recommendations_for_activity(activity_id).await.unwrap();
    assert_eq!(linked.len(), 1);
    let changed = release_activity(&mut linked, activity_id, day(2024, 6, 1), "2024-06-01T00:00:00Z");
    let released: Vec<_> = changed.iter().map(|&i| linked[i].clone()).collect();

    db.delete_activity_cascade(activity_id, &released).await.unwrap();

    assert!(db.get_activity(activity_id).await.unwrap().is_none());
    assert!(db
        .get_best_efforts_for_activity(activity_id)
        .await
        .unwrap()
        .is_empty());
    let rec = db.get_recommendation(&rec.id).await.unwrap().unwrap();
    assert_eq!(rec.status, RecommendationStatus::Expired);
    assert_eq!(rec.matched_activity_id, None);
}

#[tokio::test]
async fn test_settings_goals_and_sync_state() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();

    assert!(db.get_settings(athlete_id).await.unwrap().is_none());
    let mut settings = TrainingSettings::default_for(athlete_id);
    settings.weekly_frequency = 5;
    db.set_settings(&settings).await.unwrap();
    assert_eq!(
        db.get_settings(athlete_id).await.unwrap().unwrap().weekly_frequency,
        5
    );

    let goal = MonthlyGoal {
        athlete_id,
        month: "2024-05".to_string(),
        distance_goal_meters: 150_000.0,
        updated_at: "2024-05-01T00:00:00Z".to_string(),
    };
    db.set_goal(&goal).await.unwrap();
    assert_eq!(db.get_goal(athlete_id, "2024-05").await.unwrap(), Some(goal));
    assert!(db.get_goal(athlete_id, "2024-06").await.unwrap().is_none());

    let mut state = SyncState::new(athlete_id);
    state.last_activity_start = Some(parse_time("2024-05-01T07:00:00Z"));
    state.activities_synced = 3;
    db.set_sync_state(&state).await.unwrap();
    assert_eq!(db.get_sync_state(athlete_id).await.unwrap(), Some(state));
}

#[tokio::test]
async fn test_delete_user_data() {
    require_emulator!();

    let db = test_db().await;
    let athlete_id = unique_athlete_id();
    let activity_id = athlete_id + 3;

    db.upsert_user(&test_user(athlete_id)).await.unwrap();
    let run = test_run(activity_id, athlete_id, "2024-05-01T07:00:00Z", 5000.0);
    let efforts = [effort(activity_id * 10, activity_id, athlete_id, 5000.0, 1500)];
    db.upsert_synced_activity(&run, Some(&efforts)).await.unwrap();
    db.replace_personal_records(athlete_id, &extract_personal_records(athlete_id, &efforts))
        .await
        .unwrap();
    db.set_settings(&TrainingSettings::default_for(athlete_id))
        .await
        .unwrap();

    let deleted = db.delete_user_data(athlete_id).await.unwrap();
    assert!(deleted >= 5);

    assert!(db.get_user(athlete_id).await.unwrap().is_none());
    assert!(db.get_all_activities(athlete_id).await.unwrap().is_empty());
    assert!(db.get_best_efforts_for_user(athlete_id).await.unwrap().is_empty());
    assert!(db.get_personal_records(athlete_id).await.unwrap().is_empty());
    assert!(db.get_settings(athlete_id).await.unwrap().is_none());
}
