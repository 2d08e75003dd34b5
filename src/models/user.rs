// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    /// Email address (may be None if not shared)
    #[serde(default)]
    pub email: Option<String>,
    pub firstname: String,
    pub lastname: String,
    /// Profile picture URL
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// "City, Country" from the Strava profile
    #[serde(default)]
    pub location: Option<String>,
    /// When user first connected
    pub created_at: String,
    /// Last login or sync
    pub last_active: String,
}

/// User's OAuth tokens (encrypted in Firestore).
///
/// Tokens are never refreshed; once `expires_at` passes the user has to
/// reconnect through the OAuth flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64), kept for deauthorization
    pub refresh_token_encrypted: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}
