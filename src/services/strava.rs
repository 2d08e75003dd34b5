// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for reading activities.
//!
//! Handles:
//! - OAuth code exchange and deauthorization
//! - Paged activity listing and detail fetch (with best efforts)
//! - Rate limit (429) and revoked-token (401) detection

use crate::error::AppError;
use crate::models::{Activity, BestEffort};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Scopes requested during the OAuth flow.
pub const OAUTH_SCOPES: &str = "read,activity:read_all";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_base_urls(
            client_id,
            client_secret,
            DEFAULT_API_BASE.to_string(),
            DEFAULT_OAUTH_BASE.to_string(),
        )
    }

    /// Client pointed at a different host (tests, proxies).
    pub fn with_base_urls(
        client_id: String,
        client_secret: String,
        api_base: String,
        oauth_base: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    /// Get a detailed activity by ID, including best efforts.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);
        self.get_json(&url, access_token).await
    }

    /// List the athlete's activities started after `after` (paginated).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::StravaApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to parse token response: {}", e)))
    }

    /// Deauthorize the application for a user.
    ///
    /// Invalidates all tokens for the user and removes the app from their
    /// Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Deauthorization request failed: {}", e)))?;

        check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Map a non-success status to the matching error.
async fn status_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status.as_u16() {
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            AppError::RateLimited(AppError::STRAVA_RATE_LIMIT.to_string())
        }
        401 => AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()),
        _ => AppError::StravaApi(format!("HTTP {}: {}", status, body)),
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(status_error(response).await)
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
}

/// Activity as returned by both the list and the detail endpoints.
///
/// `best_efforts` and `calories` only appear on the detail response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(rename = "type", default)]
    pub legacy_type: Option<String>,
    pub distance: f64,
    pub moving_time: u32,
    pub elapsed_time: u32,
    #[serde(default)]
    pub total_elevation_gain: f64,
    pub start_date: DateTime<Utc>,
    /// Local wall-clock time, sent with a misleading `Z` suffix
    pub start_date_local: DateTime<Utc>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_country: Option<String>,
    #[serde(default)]
    pub best_efforts: Vec<StravaBestEffort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StravaBestEffort {
    pub id: u64,
    pub name: String,
    pub distance: f64,
    pub moving_time: u32,
    pub elapsed_time: u32,
    pub start_date: DateTime<Utc>,
}

impl StravaActivity {
    /// Sport type, falling back to the legacy `type` field.
    pub fn activity_type(&self) -> &str {
        self.sport_type
            .as_deref()
            .or(self.legacy_type.as_deref())
            .unwrap_or("")
    }

    /// "City, Country" from whichever parts are present.
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.location_city, &self.location_country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// Convert into the stored activity and its best efforts.
    pub fn into_records(self, athlete_id: u64, synced_at: &str) -> (Activity, Vec<BestEffort>) {
        let location = self.location();
        let activity_type = self.activity_type().to_string();

        let best_efforts = self
            .best_efforts
            .iter()
            .map(|e| BestEffort {
                best_effort_id: e.id,
                activity_id: self.id,
                athlete_id,
                name: e.name.clone(),
                distance_meters: e.distance,
                moving_time_seconds: e.moving_time,
                elapsed_time_seconds: e.elapsed_time,
                start_date: e.start_date,
                activity_name: self.name.clone(),
                location: location.clone(),
            })
            .collect();

        let activity = Activity {
            strava_activity_id: self.id,
            athlete_id,
            name: self.name,
            activity_type,
            distance_meters: self.distance,
            moving_time_seconds: self.moving_time,
            elapsed_time_seconds: self.elapsed_time,
            elevation_gain_meters: self.total_elevation_gain,
            start_date: self.start_date,
            start_date_local: self.start_date_local.naive_utc(),
            average_heartrate: self.average_heartrate,
            max_heartrate: self.max_heartrate,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
            calories: self.calories,
            location,
            effort_rating: None,
            notes: None,
            synced_at: synced_at.to_string(),
        };

        (activity, best_efforts)
    }
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::models::{User, UserTokens};
use crate::services::token_cipher::{encrypt_tokens, TokenCipher};

/// High-level Strava service that owns token storage and API calls.
///
/// Access tokens are never refreshed. Once the stored expiry passes, every
/// call fails with the Strava token error and the user has to reconnect.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    cipher: TokenCipher,
}

impl StravaService {
    pub fn new(client: StravaClient, db: FirestoreDb, cipher: TokenCipher) -> Self {
        Self { client, db, cipher }
    }

    pub fn from_config(config: &Config, db: FirestoreDb, cipher: TokenCipher) -> Self {
        Self::new(
            StravaClient::with_base_urls(
                config.strava_client_id.clone(),
                config.strava_client_secret.clone(),
                config.strava_api_base.clone(),
                config.strava_oauth_base.clone(),
            ),
            db,
            cipher,
        )
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Decrypt the stored access token for `athlete_id`, if still valid.
    pub async fn get_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let tokens = self
            .db
            .get_tokens(athlete_id)
            .await?
            .ok_or_else(|| AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()))?;

        let expires_at = DateTime::parse_from_rfc3339(&tokens.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            tracing::info!(athlete_id, "Strava access token expired, reconnect required");
            return Err(AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()));
        }

        Ok(self
            .cipher
            .decrypt(&tokens.access_token_encrypted, athlete_id)?)
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange the code, then store the user profile and encrypted tokens.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthResult, AppError> {
        let token_response = self.client.exchange_code(code).await?;

        let athlete = &token_response.athlete;
        let athlete_id = athlete.id;
        let now = Utc::now().to_rfc3339();

        let created_at = match self.db.get_user(athlete_id).await {
            Ok(Some(existing)) => existing.created_at,
            _ => now.clone(),
        };

        let location = [&athlete.city, &athlete.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let user = User {
            strava_athlete_id: athlete_id,
            email: None,
            firstname: athlete.firstname.clone(),
            lastname: athlete.lastname.clone(),
            profile_picture: athlete.profile.clone(),
            location: (!location.is_empty()).then_some(location),
            created_at,
            last_active: now.clone(),
        };

        self.db.upsert_user(&user).await?;

        let expires_at = DateTime::<Utc>::from_timestamp(token_response.expires_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| now.clone());

        let (enc_access, enc_refresh) = encrypt_tokens(
            &self.cipher,
            &token_response.access_token,
            &token_response.refresh_token,
            athlete_id,
        )?;

        let tokens = UserTokens {
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at,
            scopes: OAUTH_SCOPES.split(',').map(str::to_string).collect(),
        };

        self.db.set_tokens(athlete_id, &tokens).await?;

        tracing::info!(
            athlete_id,
            firstname = %user.firstname,
            "OAuth callback handled, user and tokens stored"
        );

        Ok(OAuthResult {
            athlete_id,
            firstname: user.firstname,
            lastname: user.lastname,
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    pub async fn get_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let access_token = self.get_access_token(athlete_id).await?;
        self.client.get_activity(&access_token, activity_id).await
    }

    pub async fn list_activities(
        &self,
        athlete_id: u64,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let access_token = self.get_access_token(athlete_id).await?;
        self.client
            .list_activities(&access_token, after, page, per_page)
            .await
    }

    /// Deauthorize with a specific token.
    pub async fn deauthorize_with_token(&self, access_token: &str) -> Result<(), AppError> {
        self.client.deauthorize(access_token).await
    }

    /// Delete the stored tokens and hand back the plaintext access token for
    /// a final deauthorization call.
    ///
    /// Tokens are deleted before decryption so no sync can use them
    /// concurrently. Returns `None` when nothing usable was stored.
    pub async fn revoke_local_tokens(&self, athlete_id: u64) -> Result<Option<String>, AppError> {
        let Some(tokens) = self.db.get_tokens(athlete_id).await? else {
            return Ok(None);
        };

        self.db.delete_tokens(athlete_id).await?;

        match self.cipher.decrypt(&tokens.access_token_encrypted, athlete_id) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    athlete_id,
                    "Failed to decrypt tokens (skipping deauth)"
                );
                Ok(None)
            }
        }
    }
}

/// Result of handling OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_JSON: &str = r#"{
        "id": 1001,
        "name": "Morning Run",
        "sport_type": "TrailRun",
        "type": "Run",
        "distance": 10234.5,
        "moving_time": 3100,
        "elapsed_time": 3300,
        "total_elevation_gain": 120.0,
        "start_date": "2024-03-04T06:30:00Z",
        "start_date_local": "2024-03-04T07:30:00Z",
        "average_heartrate": 151.2,
        "average_speed": 3.3,
        "calories": 712.0,
        "location_city": "Lyon",
        "location_country": "France",
        "best_efforts": [
            {"id": 9001, "name": "5k", "distance": 5000, "moving_time": 1490,
             "elapsed_time": 1490, "start_date": "2024-03-04T06:40:00Z"}
        ]
    }"#;

    #[test]
    fn test_detail_into_records() {
        let detail: StravaActivity = serde_json::from_str(DETAIL_JSON).unwrap();
        let (activity, efforts) = detail.into_records(42, "2024-03-04T12:00:00Z");

        assert_eq!(activity.activity_type, "TrailRun");
        assert!(activity.is_run());
        assert_eq!(activity.location.as_deref(), Some("Lyon, France"));
        assert_eq!(activity.start_date_local.to_string(), "2024-03-04 07:30:00");
        assert_eq!(activity.effort_rating, None);

        assert_eq!(efforts.len(), 1);
        assert_eq!(efforts[0].activity_id, 1001);
        assert_eq!(efforts[0].athlete_id, 42);
        assert_eq!(efforts[0].activity_name, "Morning Run");
        assert_eq!(efforts[0].distance_meters, 5000.0);
    }

    #[test]
    fn test_summary_without_optional_fields() {
        let json = r#"{
            "id": 7, "name": "Ride", "type": "Ride", "distance": 20000,
            "moving_time": 3600, "elapsed_time": 3700,
            "start_date": "2024-03-04T06:30:00Z",
            "start_date_local": "2024-03-04T07:30:00Z"
        }"#;
        let summary: StravaActivity = serde_json::from_str(json).unwrap();
        assert_eq!(summary.activity_type(), "Ride");
        assert!(summary.best_efforts.is_empty());
        assert_eq!(summary.location(), None);
    }
}
