// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Personal records derived from best efforts.
//!
//! Records are never edited in place: each sync recomputes the full set from
//! every stored best effort and swaps it in, so a deleted activity stops
//! contributing as soon as the next extraction runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::BestEffort;

/// Shortest distance that produces a record.
pub const MIN_RECORD_DISTANCE_METERS: f64 = 400.0;

/// Canonical buckets keyed by distance in metres.
const DISTANCE_BUCKETS: &[(u32, &str)] = &[
    (400, "400m"),
    (805, "1/2 mile"),
    (1000, "1km"),
    (1609, "1 mile"),
    (3219, "2 miles"),
    (5000, "5km"),
    (10000, "10km"),
    (15000, "15km"),
    (16090, "10 miles"),
    (16093, "10 miles"),
    (20000, "20km"),
    (21097, "semi"),
    (30000, "30km"),
    (42195, "marathon"),
];

/// Strava reports some canonical distances with a fractional part
/// (21097.5 m, 16090.34 m).
const BUCKET_TOLERANCE_METERS: f64 = 1.0;

/// Map a distance to its bucket label.
///
/// Unmapped distances get a computed "X.Xkm" label.
pub fn bucket_label(distance_meters: f64) -> String {
    DISTANCE_BUCKETS
        .iter()
        .find(|(meters, _)| (distance_meters - *meters as f64).abs() <= BUCKET_TOLERANCE_METERS)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| format!("{:.1}km", distance_meters / 1000.0))
}

/// Best time for one distance bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PersonalRecord {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// Bucket label, e.g. "5km" or "semi"
    pub bucket: String,
    pub distance_meters: f64,
    pub moving_time_seconds: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activity_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub best_effort_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub achieved_at: DateTime<Utc>,
    /// Where it happened, falling back to the activity name
    pub location: String,
}

impl PersonalRecord {
    /// Document ID: one record per athlete per bucket.
    pub fn doc_id(&self) -> String {
        record_doc_id(self.athlete_id, &self.bucket)
    }
}

pub fn record_doc_id(athlete_id: u64, bucket: &str) -> String {
    format!("{}_{}", athlete_id, urlencoding::encode(bucket))
}

/// Build the full record set for one athlete.
///
/// Keeps the minimum moving time per bucket. Equal times go to the earlier
/// effort, then to the lower best-effort ID, so the result does not depend
/// on input order. Output is sorted by distance.
pub fn extract_personal_records(athlete_id: u64, efforts: &[BestEffort]) -> Vec<PersonalRecord> {
    let mut best: BTreeMap<String, &BestEffort> = BTreeMap::new();

    for effort in efforts.iter().filter(|e| {
        e.athlete_id == athlete_id && e.distance_meters >= MIN_RECORD_DISTANCE_METERS
    }) {
        let bucket = bucket_label(effort.distance_meters);
        match best.get(&bucket) {
            Some(current) if !beats(effort, current) => {}
            _ => {
                best.insert(bucket, effort);
            }
        }
    }

    let mut records: Vec<PersonalRecord> = best
        .into_iter()
        .map(|(bucket, effort)| PersonalRecord {
            athlete_id,
            bucket,
            distance_meters: effort.distance_meters,
            moving_time_seconds: effort.moving_time_seconds,
            activity_id: effort.activity_id,
            best_effort_id: effort.best_effort_id,
            achieved_at: effort.start_date,
            location: effort
                .location
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| effort.activity_name.clone()),
        })
        .collect();

    records.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.bucket.cmp(&b.bucket))
    });
    records
}

fn beats(candidate: &BestEffort, current: &BestEffort) -> bool {
    (
        candidate.moving_time_seconds,
        candidate.start_date,
        candidate.best_effort_id,
    ) < (
        current.moving_time_seconds,
        current.start_date,
        current.best_effort_id,
    )
}

/// Buckets present in `old` but absent from `new`; these must be deleted
/// when the new set is committed.
pub fn stale_buckets<'a>(old: &'a [PersonalRecord], new: &[PersonalRecord]) -> Vec<&'a str> {
    old.iter()
        .filter(|o| !new.iter().any(|n| n.bucket == o.bucket))
        .map(|o| o.bucket.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATHLETE: u64 = 12345;

    fn effort(id: u64, activity_id: u64, distance: f64, time: u32, date: &str) -> BestEffort {
        BestEffort {
            best_effort_id: id,
            activity_id,
            athlete_id: ATHLETE,
            name: "effort".to_string(),
            distance_meters: distance,
            moving_time_seconds: time,
            elapsed_time_seconds: time,
            start_date: DateTime::parse_from_rfc3339(date)
                .unwrap()
                .with_timezone(&Utc),
            activity_name: format!("Run {}", activity_id),
            location: None,
        }
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(bucket_label(5000.0), "5km");
        assert_eq!(bucket_label(21097.5), "semi");
        assert_eq!(bucket_label(42195.0), "marathon");
        assert_eq!(bucket_label(16090.34), "10 miles");
        assert_eq!(bucket_label(7500.0), "7.5km");
    }

    #[test]
    fn test_minimum_time_wins() {
        let efforts = vec![
            effort(1, 100, 5000.0, 1500, "2024-01-01T08:00:00Z"),
            effort(2, 101, 5000.0, 1400, "2024-01-08T08:00:00Z"),
        ];

        let records = extract_personal_records(ATHLETE, &efforts);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bucket, "5km");
        assert_eq!(records[0].moving_time_seconds, 1400);
        assert_eq!(records[0].activity_id, 101);
    }

    #[test]
    fn test_record_is_lower_bound_of_bucket() {
        let efforts = vec![
            effort(1, 100, 1000.0, 240, "2024-01-01T08:00:00Z"),
            effort(2, 101, 1000.0, 225, "2024-01-02T08:00:00Z"),
            effort(3, 102, 1000.0, 260, "2024-01-03T08:00:00Z"),
            effort(4, 102, 10000.0, 2700, "2024-01-03T08:00:00Z"),
        ];

        let records = extract_personal_records(ATHLETE, &efforts);

        for record in &records {
            let bucket_times: Vec<u32> = efforts
                .iter()
                .filter(|e| bucket_label(e.distance_meters) == record.bucket)
                .map(|e| e.moving_time_seconds)
                .collect();
            assert!(bucket_times.iter().all(|t| record.moving_time_seconds <= *t));
            assert_eq!(
                Some(record.moving_time_seconds),
                bucket_times.iter().copied().min()
            );
        }
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bucket, "1km");
    }

    #[test]
    fn test_short_distances_are_dropped() {
        let efforts = vec![effort(1, 100, 200.0, 35, "2024-01-01T08:00:00Z")];
        assert!(extract_personal_records(ATHLETE, &efforts).is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent_and_order_independent() {
        let efforts = vec![
            effort(1, 100, 5000.0, 1400, "2024-01-08T08:00:00Z"),
            effort(2, 101, 5000.0, 1400, "2024-01-01T08:00:00Z"),
            effort(3, 101, 1609.0, 400, "2024-01-01T08:00:00Z"),
        ];
        let mut reversed = efforts.clone();
        reversed.reverse();

        let first = extract_personal_records(ATHLETE, &efforts);
        let second = extract_personal_records(ATHLETE, &efforts);
        let third = extract_personal_records(ATHLETE, &reversed);

        assert_eq!(first, second);
        assert_eq!(first, third);
        // Tie on time: earlier effort holds the record
        let five_k = first.iter().find(|r| r.bucket == "5km").unwrap();
        assert_eq!(five_k.best_effort_id, 2);
    }

    #[test]
    fn test_removed_activity_stops_producing_record() {
        let efforts = vec![
            effort(1, 100, 5000.0, 1300, "2024-01-01T08:00:00Z"),
            effort(2, 101, 5000.0, 1450, "2024-01-08T08:00:00Z"),
        ];
        let remaining: Vec<BestEffort> = efforts
            .iter()
            .filter(|e| e.activity_id != 100)
            .cloned()
            .collect();

        let records = extract_personal_records(ATHLETE, &remaining);

        assert_eq!(records[0].moving_time_seconds, 1450);
        assert_eq!(records[0].activity_id, 101);
    }

    #[test]
    fn test_location_falls_back_to_activity_name() {
        let mut with_location = effort(1, 100, 5000.0, 1500, "2024-01-01T08:00:00Z");
        with_location.location = Some("Lyon, France".to_string());
        let records = extract_personal_records(ATHLETE, &[with_location]);
        assert_eq!(records[0].location, "Lyon, France");

        let records = extract_personal_records(
            ATHLETE,
            &[effort(1, 100, 5000.0, 1500, "2024-01-01T08:00:00Z")],
        );
        assert_eq!(records[0].location, "Run 100");
    }

    #[test]
    fn test_stale_buckets() {
        let old = extract_personal_records(
            ATHLETE,
            &[
                effort(1, 100, 5000.0, 1500, "2024-01-01T08:00:00Z"),
                effort(2, 100, 10000.0, 3100, "2024-01-01T08:00:00Z"),
            ],
        );
        let new = extract_personal_records(
            ATHLETE,
            &[effort(3, 101, 5000.0, 1450, "2024-01-02T08:00:00Z")],
        );

        assert_eq!(stale_buckets(&old, &new), vec!["10km"]);
    }
}
