// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stride Dashboard: a personal running dashboard backed by Strava
//!
//! This crate provides the backend API that syncs running activities from
//! Strava, computes statistics and personal records, and asks a language
//! model for training recommendations.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{CoachService, StravaService, SyncService, TokenCipher};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava_service: StravaService,
    pub coach_service: CoachService,
    pub sync_service: SyncService,
}

impl AppState {
    /// Wire every service from configuration and a database handle.
    pub fn new(config: Config, db: FirestoreDb) -> anyhow::Result<Self> {
        let cipher = TokenCipher::new(&config.token_encryption_key)?;
        let strava_service = StravaService::from_config(&config, db.clone(), cipher);
        let coach_service = CoachService::from_config(&config, db.clone())?;
        let sync_service = SyncService::new(
            db.clone(),
            strava_service.clone(),
            coach_service.clone(),
            config.sync.clone(),
        );

        Ok(Self {
            config,
            db,
            strava_service,
            coach_service,
            sync_service,
        })
    }
}
