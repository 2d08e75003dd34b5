use chrono::{DateTime, Duration, NaiveDate, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use stride_dashboard::models::records::extract_personal_records;
use stride_dashboard::models::stats::{aggregate, monthly_totals};
use stride_dashboard::models::{Activity, BestEffort, DashboardStats, DateRange};

const ATHLETE: u64 = 1;

/// Roughly five years of near-daily running.
fn history() -> (Vec<Activity>, Vec<BestEffort>) {
    let first = DateTime::parse_from_rfc3339("2020-01-01T06:30:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let mut activities = Vec::new();
    let mut efforts = Vec::new();

    for i in 0..1800u64 {
        let start = first + Duration::hours(i as i64 * 25);
        let distance = 4000.0 + (i % 17) as f64 * 1000.0;
        activities.push(Activity {
            strava_activity_id: i,
            athlete_id: ATHLETE,
            name: format!("Run {}", i),
            activity_type: if i % 9 == 0 { "Ride" } else { "Run" }.to_string(),
            distance_meters: distance,
            moving_time_seconds: (distance * 0.31) as u32,
            elapsed_time_seconds: (distance * 0.33) as u32,
            elevation_gain_meters: (i % 40) as f64,
            start_date: start,
            start_date_local: start.naive_utc(),
            average_heartrate: Some(140.0 + (i % 30) as f64),
            max_heartrate: None,
            average_speed: None,
            max_speed: None,
            calories: None,
            location: None,
            effort_rating: None,
            notes: None,
            synced_at: String::new(),
        });

        for (j, d) in [400.0, 1000.0, 1609.34, 5000.0, 10000.0]
            .into_iter()
            .filter(|d| *d <= distance)
            .enumerate()
        {
            efforts.push(BestEffort {
                best_effort_id: i * 10 + j as u64,
                activity_id: i,
                athlete_id: ATHLETE,
                name: String::new(),
                distance_meters: d,
                moving_time_seconds: (d * (0.27 + (i % 13) as f64 * 0.005)) as u32,
                elapsed_time_seconds: (d * 0.3) as u32,
                start_date: start,
                activity_name: String::new(),
                location: None,
            });
        }
    }

    (activities, efforts)
}

fn benchmark_stats(c: &mut Criterion) {
    let (activities, efforts) = history();
    let today = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
    let month = DateRange::month(2024, 11).unwrap();

    let mut group = c.benchmark_group("stats");

    group.bench_function("aggregate_month", |b| {
        b.iter(|| aggregate(black_box(&activities), ATHLETE, black_box(&month)))
    });

    group.bench_function("monthly_totals_year", |b| {
        b.iter(|| monthly_totals(black_box(&activities), ATHLETE, 2024))
    });

    group.bench_function("dashboard", |b| {
        b.iter(|| DashboardStats::compute(black_box(&activities), ATHLETE, today, None))
    });

    group.bench_function("personal_records", |b| {
        b.iter(|| extract_personal_records(ATHLETE, black_box(&efforts)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_stats);
criterion_main!(benches);
