// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava → Firestore activity sync.
//!
//! One sync:
//! 1. Lists activities after the last synced start (or the epoch for a full
//!    resync), page by page.
//! 2. Keeps running activities only and fetches each one's detail for its
//!    best efforts.
//! 3. Upserts activities and replaces their best efforts. When only the
//!    summary could be fetched, stored best efforts are kept.
//! 4. Recomputes personal records and reconciles recommendations.
//! 5. Saves the new sync state.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::SyncLimits;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::records::extract_personal_records;
use crate::models::{is_running_type, Activity, BestEffort, SyncState};
use crate::services::coach::CoachService;
use crate::services::strava::{StravaActivity, StravaService};
use crate::services::sync_guard::SyncGuard;

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReport {
    pub pages_fetched: u32,
    pub activities_synced: u32,
    pub best_efforts_synced: u32,
    pub personal_records: u32,
    pub recommendations_matched: u32,
}

/// One activity ready to store.
#[derive(Debug, Clone)]
pub struct SyncedActivity {
    pub activity: Activity,
    /// `None` when the detail fetch failed and only the summary is known
    pub best_efforts: Option<Vec<BestEffort>>,
}

#[derive(Clone)]
pub struct SyncService {
    db: FirestoreDb,
    strava: StravaService,
    coach: CoachService,
    guard: SyncGuard,
    limits: SyncLimits,
}

/// Unix timestamp to pass as Strava's `after` parameter.
pub fn after_timestamp(state: &SyncState, full: bool) -> i64 {
    if full {
        return 0;
    }
    state
        .last_activity_start
        .map(|start| start.timestamp())
        .unwrap_or(0)
}

/// Newest start among `activities`, never moving backwards from `previous`.
pub fn advance_cursor(
    previous: Option<DateTime<Utc>>,
    activities: &[Activity],
) -> Option<DateTime<Utc>> {
    activities
        .iter()
        .map(|a| a.start_date)
        .chain(previous)
        .max()
}

/// Running activities of one listed page, and whether it was the last page.
pub fn keep_runs(batch: Vec<StravaActivity>, per_page: u32) -> (Vec<StravaActivity>, bool) {
    let last_page = (batch.len() as u32) < per_page;
    let runs = batch
        .into_iter()
        .filter(|a| is_running_type(a.activity_type()))
        .collect();
    (runs, last_page)
}

/// Turn a detail fetch result into the record to store.
///
/// Rate-limit and token errors abort the sync. Any other error keeps the
/// summary without touching stored best efforts.
pub fn resolve_detail(
    athlete_id: u64,
    summary: StravaActivity,
    detail: Result<StravaActivity, AppError>,
    synced_at: &str,
) -> Result<SyncedActivity, AppError> {
    match detail {
        Ok(detail) => {
            let (activity, efforts) = detail.into_records(athlete_id, synced_at);
            Ok(SyncedActivity {
                activity,
                best_efforts: Some(efforts),
            })
        }
        Err(e) if e.is_rate_limited() || e.is_strava_token_error() => Err(e),
        Err(e) => {
            tracing::warn!(
                athlete_id,
                activity_id = summary.id,
                error = %e,
                "Detail fetch failed, storing summary only"
            );
            let (activity, _) = summary.into_records(athlete_id, synced_at);
            Ok(SyncedActivity {
                activity,
                best_efforts: None,
            })
        }
    }
}

impl SyncService {
    pub fn new(
        db: FirestoreDb,
        strava: StravaService,
        coach: CoachService,
        limits: SyncLimits,
    ) -> Self {
        Self {
            db,
            strava,
            coach,
            guard: SyncGuard::new(limits.clone()),
            limits,
        }
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Run a sync for one athlete, subject to the per-athlete limits.
    pub async fn sync(&self, athlete_id: u64, full: bool) -> Result<SyncReport, AppError> {
        let now = Utc::now();
        self.guard.try_acquire(athlete_id, now)?;

        let mut state = self
            .db
            .get_sync_state(athlete_id)
            .await?
            .unwrap_or_else(|| SyncState::new(athlete_id));

        tracing::info!(athlete_id, full, "Sync started");

        match self.run(athlete_id, full, &state).await {
            Ok((report, synced)) => {
                state.last_sync_at = Some(Utc::now().to_rfc3339());
                state.last_activity_start = advance_cursor(
                    if full { None } else { state.last_activity_start },
                    &synced,
                )
                .or(state.last_activity_start);
                state.activities_synced += report.activities_synced;
                state.last_error = None;
                self.db.set_sync_state(&state).await?;

                tracing::info!(
                    athlete_id,
                    activities = report.activities_synced,
                    records = report.personal_records,
                    matched = report.recommendations_matched,
                    "Sync finished"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "Sync failed");
                state.last_error = Some(e.to_string());
                if let Err(db_err) = self.db.set_sync_state(&state).await {
                    tracing::error!(error = %db_err, "Failed to record sync error");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        athlete_id: u64,
        full: bool,
        state: &SyncState,
    ) -> Result<(SyncReport, Vec<Activity>), AppError> {
        let mut report = SyncReport::default();
        let after = after_timestamp(state, full);

        let mut summaries: Vec<StravaActivity> = Vec::new();
        for page in 1..=self.limits.max_pages {
            let batch = self
                .strava
                .list_activities(athlete_id, after, page, self.limits.per_page)
                .await?;
            report.pages_fetched = page;
            let (runs, last_page) = keep_runs(batch, self.limits.per_page);
            summaries.extend(runs);
            if last_page {
                break;
            }
        }

        let synced_at = Utc::now().to_rfc3339();
        let details: Vec<SyncedActivity> = stream::iter(summaries)
            .map(|summary| {
                let synced_at = synced_at.clone();
                async move {
                    let detail = self.strava.get_activity(athlete_id, summary.id).await;
                    resolve_detail(athlete_id, summary, detail, &synced_at)
                }
            })
            .buffer_unordered(self.limits.detail_concurrency.max(1))
            .collect::<Vec<Result<_, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<_, AppError>>()?;

        let mut synced = Vec::with_capacity(details.len());
        for SyncedActivity {
            activity,
            best_efforts,
        } in details
        {
            self.db
                .upsert_synced_activity(&activity, best_efforts.as_deref())
                .await?;
            report.activities_synced += 1;
            report.best_efforts_synced += best_efforts.map_or(0, |e| e.len() as u32);
            synced.push(activity);
        }

        report.personal_records = self.recompute_personal_records(athlete_id).await? as u32;
        report.recommendations_matched = self
            .coach
            .reconcile_after_sync(athlete_id, &synced, Utc::now().date_naive())
            .await? as u32;

        Ok((report, synced))
    }

    /// Rebuild the athlete's personal records from every stored best effort.
    /// Returns the number of records.
    pub async fn recompute_personal_records(&self, athlete_id: u64) -> Result<usize, AppError> {
        let efforts = self.db.get_best_efforts_for_user(athlete_id).await?;
        let records = extract_personal_records(athlete_id, &efforts);
        self.db
            .replace_personal_records(athlete_id, &records)
            .await?;
        Ok(records.len())
    }
}
