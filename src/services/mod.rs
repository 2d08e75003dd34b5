// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Business logic services.

pub mod classifier;
pub mod coach;
pub mod llm;
pub mod prompt;
pub mod strava;
pub mod sync;
pub mod sync_guard;
pub mod token_cipher;

pub use coach::CoachService;
pub use strava::{StravaClient, StravaService};
pub use sync::{SyncReport, SyncService};
pub use sync_guard::SyncGuard;
pub use token_cipher::TokenCipher;
