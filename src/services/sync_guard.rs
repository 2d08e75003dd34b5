// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-athlete limits on manual syncs, checked before any Strava call.
//!
//! Counters live in process memory; a restart resets them.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::SyncLimits;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncDenied {
    #[error("A sync ran recently; retry in {retry_after_secs}s")]
    TooSoon { retry_after_secs: u64 },
    #[error("Daily sync limit of {cap} reached")]
    DailyCapReached { cap: u32 },
}

impl From<SyncDenied> for AppError {
    fn from(err: SyncDenied) -> Self {
        AppError::RateLimited(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct SyncWindow {
    last_sync: Option<DateTime<Utc>>,
    day: NaiveDate,
    count_today: u32,
}

/// Shared sync limiter for use in AppState.
#[derive(Clone)]
pub struct SyncGuard {
    limits: SyncLimits,
    windows: Arc<DashMap<u64, SyncWindow>>,
}

impl SyncGuard {
    pub fn new(limits: SyncLimits) -> Self {
        Self {
            limits,
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Admit a sync at `now` and count it, or explain why not.
    ///
    /// The check and the update happen under the same map entry lock, so two
    /// concurrent requests for one athlete cannot both pass.
    pub fn try_acquire(&self, athlete_id: u64, now: DateTime<Utc>) -> Result<(), SyncDenied> {
        let today = now.date_naive();
        let mut entry = self.windows.entry(athlete_id).or_insert(SyncWindow {
            last_sync: None,
            day: today,
            count_today: 0,
        });
        let window = entry.value_mut();

        if window.day != today {
            window.day = today;
            window.count_today = 0;
        }

        if let Some(last) = window.last_sync {
            let elapsed = (now - last).num_seconds().max(0) as u64;
            if elapsed < self.limits.min_interval_secs {
                return Err(SyncDenied::TooSoon {
                    retry_after_secs: self.limits.min_interval_secs - elapsed,
                });
            }
        }

        if window.count_today >= self.limits.daily_cap {
            return Err(SyncDenied::DailyCapReached {
                cap: self.limits.daily_cap,
            });
        }

        window.last_sync = Some(now);
        window.count_today += 1;
        Ok(())
    }

    /// Forget an athlete (account deletion).
    pub fn forget(&self, athlete_id: u64) {
        self.windows.remove(&athlete_id);
    }
}
