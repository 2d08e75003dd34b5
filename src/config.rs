// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets arrive as environment variables (Cloud Run secret bindings in
//! production, a `.env` file locally) and are read once at startup.

use std::env;
use std::str::FromStr;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Knobs for the recommendation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachTuning {
    /// Fatigue score reported when no recent effort rating exists
    pub neutral_fatigue: f64,
    /// How many of the latest rated runs feed the fatigue score
    pub fatigue_window: usize,
    /// How many recent activities are summarized in the prompt
    pub history_size: usize,
    /// Share of intervals+tempo above which the mix is "too intense"
    pub max_intensity_share: f64,
    /// Minimum number of runs before "no intensity" / "no long run" apply
    pub min_runs_for_balance: usize,
    /// Recommendations requested per generation
    pub recommendations_per_request: usize,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CoachTuning {
    fn default() -> Self {
        Self {
            neutral_fatigue: 5.0,
            fatigue_window: 5,
            history_size: 10,
            max_intensity_share: 0.5,
            min_runs_for_balance: 4,
            recommendations_per_request: 3,
            temperature: 0.7,
            max_tokens: 1500,
        }
    }
}

/// Limits applied to manual syncs.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLimits {
    /// Minimum seconds between two syncs of the same athlete
    pub min_interval_secs: u64,
    /// Maximum syncs per athlete per UTC day
    pub daily_cap: u32,
    pub per_page: u32,
    pub max_pages: u32,
    /// Concurrent detail fetches against Strava
    pub detail_concurrency: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            daily_cap: 20,
            per_page: 100,
            max_pages: 10,
            detail_concurrency: 4,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Non-sensitive ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Strava API base URL (overridable for tests)
    pub strava_api_base: String,
    /// Strava OAuth base URL
    pub strava_oauth_base: String,
    pub llm_base_url: String,
    pub llm_model: String,

    // --- Secrets ---
    pub strava_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Master key for Strava token encryption
    pub token_encryption_key: Vec<u8>,
    /// API key for the chat-completion endpoint; the coach is disabled
    /// without one
    pub llm_api_key: Option<String>,

    pub coach: CoachTuning,
    pub sync: SyncLimits,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            strava_api_base: "https://www.strava.com/api/v3".to_string(),
            strava_oauth_base: "https://www.strava.com/oauth".to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
            token_encryption_key: b"test_token_key_32_bytes_minimum!".to_vec(),
            llm_api_key: None,
            coach: CoachTuning::default(),
            sync: SyncLimits::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let coach_defaults = CoachTuning::default();
        let sync_defaults = SyncLimits::default();

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parsed("PORT", 8080)?,
            strava_api_base: env::var("STRAVA_API_BASE")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_base: env::var("STRAVA_OAUTH_BASE")
                .unwrap_or_else(|_| "https://www.strava.com/oauth".to_string()),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),

            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            jwt_signing_key: key("JWT_SIGNING_KEY")?,
            oauth_state_key: key("OAUTH_STATE_KEY")?,
            token_encryption_key: key("TOKEN_ENCRYPTION_KEY")?,
            llm_api_key: env::var("LLM_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            coach: CoachTuning {
                neutral_fatigue: parsed("COACH_NEUTRAL_FATIGUE", coach_defaults.neutral_fatigue)?,
                max_intensity_share: parsed(
                    "COACH_MAX_INTENSITY_SHARE",
                    coach_defaults.max_intensity_share,
                )?,
                min_runs_for_balance: parsed(
                    "COACH_MIN_RUNS_FOR_BALANCE",
                    coach_defaults.min_runs_for_balance,
                )?,
                temperature: parsed("LLM_TEMPERATURE", coach_defaults.temperature)?,
                max_tokens: parsed("LLM_MAX_TOKENS", coach_defaults.max_tokens)?,
                ..coach_defaults
            },
            sync: SyncLimits {
                min_interval_secs: parsed(
                    "SYNC_MIN_INTERVAL_SECS",
                    sync_defaults.min_interval_secs,
                )?,
                daily_cap: parsed("SYNC_DAILY_CAP", sync_defaults.daily_cap)?,
                ..sync_defaults
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Secret keys must carry at least 256 bits.
fn key(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = required(name)?.into_bytes();
    if value.len() < 32 {
        return Err(ConfigError::Invalid(name, "must be at least 32 bytes".to_string()));
    }
    Ok(value)
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
