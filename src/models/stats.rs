// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Running statistics computed from stored activities.
//!
//! Every figure is recomputed from the activity rows on request. The inputs
//! are one athlete's activities, so a handful of filter/sum passes is cheap
//! enough that nothing is cached or maintained incrementally.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Activity, MonthlyGoal};
use crate::time_utils::{iso_week_start, month_key, next_month, start_of_day};

/// Half-open time range `[start, end)`.
///
/// Calendar periods (`month`, `year`, `iso_week`) are wall-clock ranges in
/// the athlete's local time and are matched against `start_date_local`.
/// Use [`DateRange::storage_window`] to query stored UTC start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Calendar month `[YYYY-MM-01, next month)`.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = next_month(year, month)?;
        Some(Self::new(start_of_day(first), start_of_day(next)))
    }

    /// Calendar year `[YYYY-01-01, YYYY+1-01-01)`.
    pub fn year(year: i32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self::new(start_of_day(first), start_of_day(next)))
    }

    /// ISO week (Monday to Monday) containing `date`.
    pub fn iso_week(date: NaiveDate) -> Self {
        let monday = iso_week_start(date);
        Self::new(
            start_of_day(monday),
            start_of_day(monday + Duration::days(7)),
        )
    }

    /// Everything, for all-time figures.
    pub fn all_time() -> Self {
        Self::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether the activity's local start falls in this wall-clock range.
    pub fn contains_local(&self, activity: &Activity) -> bool {
        self.contains(activity.start_date_local.and_utc())
    }

    /// UTC window that holds every activity whose local start can fall in
    /// this wall-clock range. Local offsets stay within a day of UTC.
    pub fn storage_window(&self) -> Self {
        let margin = Duration::days(1);
        Self::new(
            self.start.checked_sub_signed(margin).unwrap_or(self.start),
            self.end.checked_add_signed(margin).unwrap_or(self.end),
        )
    }
}

/// A single activity surfaced in a summary (e.g. the longest run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityHighlight {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub name: String,
    pub distance_meters: f64,
    pub moving_time_seconds: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: DateTime<Utc>,
}

impl From<&Activity> for ActivityHighlight {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.strava_activity_id,
            name: a.name.clone(),
            distance_meters: a.distance_meters,
            moving_time_seconds: a.moving_time_seconds,
            start_date: a.start_date,
        }
    }
}

/// Totals over one date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PeriodStats {
    pub total_distance_meters: f64,
    pub activity_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_moving_time_seconds: u64,
    pub total_elevation_gain_meters: f64,
    pub average_pace_seconds_per_km: Option<f64>,
    pub longest_activity: Option<ActivityHighlight>,
}

/// Aggregate one athlete's runs whose local start falls in `range`.
///
/// Rows of other athletes or outside [`crate::models::RUNNING_TYPES`] never
/// contribute. No matching rows yields an all-zero result.
pub fn aggregate(activities: &[Activity], athlete_id: u64, range: &DateRange) -> PeriodStats {
    let mut stats = PeriodStats::default();
    let mut longest: Option<&Activity> = None;

    for activity in activities
        .iter()
        .filter(|a| a.athlete_id == athlete_id && a.is_run() && range.contains_local(a))
    {
        stats.total_distance_meters += activity.distance_meters;
        stats.activity_count += 1;
        stats.total_moving_time_seconds += activity.moving_time_seconds as u64;
        stats.total_elevation_gain_meters += activity.elevation_gain_meters;

        longest = match longest {
            Some(current) if !is_longer(activity, current) => Some(current),
            _ => Some(activity),
        };
    }

    if stats.total_distance_meters > 0.0 {
        stats.average_pace_seconds_per_km = Some(
            stats.total_moving_time_seconds as f64 / (stats.total_distance_meters / 1000.0),
        );
    }
    stats.longest_activity = longest.map(ActivityHighlight::from);
    stats
}

/// Longer distance wins; equal distances go to the earlier start.
fn is_longer(candidate: &Activity, current: &Activity) -> bool {
    candidate.distance_meters > current.distance_meters
        || (candidate.distance_meters == current.distance_meters
            && candidate.start_date < current.start_date)
}

// ─── Breakdown Views ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthTotal {
    /// "YYYY-MM"
    pub month: String,
    pub stats: PeriodStats,
}

/// Twelve monthly totals for `year`, January first.
pub fn monthly_totals(activities: &[Activity], athlete_id: u64, year: i32) -> Vec<MonthTotal> {
    (1..=12)
        .filter_map(|month| {
            DateRange::month(year, month).map(|range| MonthTotal {
                month: month_key(year, month),
                stats: aggregate(activities, athlete_id, &range),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeekTotal {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub week_start: NaiveDate,
    pub stats: PeriodStats,
}

/// The last `weeks` ISO weeks, oldest first, ending with the week of `today`.
pub fn weekly_totals(
    activities: &[Activity],
    athlete_id: u64,
    today: NaiveDate,
    weeks: u32,
) -> Vec<WeekTotal> {
    let current = iso_week_start(today);
    (0..weeks as i64)
        .rev()
        .map(|offset| {
            let week_start = current - Duration::weeks(offset);
            WeekTotal {
                week_start,
                stats: aggregate(activities, athlete_id, &DateRange::iso_week(week_start)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CalendarDay {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub distance_meters: f64,
    pub activity_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<number>"))]
    pub activity_ids: Vec<u64>,
}

/// One entry per day of the month, bucketed by the athlete's local start date.
pub fn calendar_month(
    activities: &[Activity],
    athlete_id: u64,
    year: i32,
    month: u32,
) -> Vec<CalendarDay> {
    let (Some(first), Some(next)) = (NaiveDate::from_ymd_opt(year, month, 1), next_month(year, month))
    else {
        return vec![];
    };

    let mut days: Vec<CalendarDay> = first
        .iter_days()
        .take_while(|d| *d < next)
        .map(|date| CalendarDay {
            date,
            distance_meters: 0.0,
            activity_count: 0,
            activity_ids: vec![],
        })
        .collect();

    for activity in activities
        .iter()
        .filter(|a| a.athlete_id == athlete_id && a.is_run())
    {
        let local = activity.start_date_local.date();
        if local.year() != year || local.month() != month {
            continue;
        }
        let day = &mut days[local.day0() as usize];
        day.distance_meters += activity.distance_meters;
        day.activity_count += 1;
        day.activity_ids.push(activity.strava_activity_id);
    }

    days
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GoalProgress {
    pub month: String,
    pub goal_meters: f64,
    pub completed_meters: f64,
    /// Completed share of the goal, capped at 100
    pub percent: f64,
}

/// Everything the dashboard cards show, computed in one pass per period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardStats {
    pub current_week: PeriodStats,
    pub current_month: PeriodStats,
    pub previous_month: PeriodStats,
    pub current_year: PeriodStats,
    pub all_time: PeriodStats,
    pub goal: Option<GoalProgress>,
}

impl DashboardStats {
    pub fn compute(
        activities: &[Activity],
        athlete_id: u64,
        today: NaiveDate,
        goal: Option<&MonthlyGoal>,
    ) -> Self {
        let (year, month) = (today.year(), today.month());
        let (prev_year, prev_month) = if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        };

        let period = |range: Option<DateRange>| {
            range
                .map(|r| aggregate(activities, athlete_id, &r))
                .unwrap_or_default()
        };

        let current_month = period(DateRange::month(year, month));
        let goal = goal
            .filter(|g| g.month == month_key(year, month) && g.distance_goal_meters > 0.0)
            .map(|g| GoalProgress {
                month: g.month.clone(),
                goal_meters: g.distance_goal_meters,
                completed_meters: current_month.total_distance_meters,
                percent: (current_month.total_distance_meters / g.distance_goal_meters * 100.0)
                    .min(100.0),
            });

        Self {
            current_week: aggregate(activities, athlete_id, &DateRange::iso_week(today)),
            previous_month: period(DateRange::month(prev_year, prev_month)),
            current_year: period(DateRange::year(year)),
            all_time: aggregate(activities, athlete_id, &DateRange::all_time()),
            current_month,
            goal,
        }
    }
}
