// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, removal_cookie, session_cookie};
use crate::services::strava::OAUTH_SCOPES;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed OAuth state stays valid.
const STATE_TTL_MILLIS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to return to. Only the configured frontend and local
    /// development origins are accepted.
    #[serde(default)]
    redirect_uri: Option<String>,
}

fn is_allowed_frontend(url: &str, configured: &str) -> bool {
    url == configured
        || url.starts_with("http://localhost")
        || url.starts_with("http://127.0.0.1")
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn sign(payload: &str, secret: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Build the signed state: base64("frontend_url|timestamp_hex|signature_hex").
fn encode_state(frontend_url: &str, timestamp_millis: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_millis);
    let signature = sign(&payload, secret)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC init failed")))?;
    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the signature and age of a state parameter and return its
/// frontend URL.
fn verify_and_decode_state(state: &str, secret: &[u8], now_millis: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The URL itself may contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let expected = sign(&format!("{}|{}", frontend_url, timestamp_hex), secret)?;
    let provided = hex::decode(signature_hex).ok()?;
    if !bool::from(expected.ct_eq(&provided)) {
        tracing::error!("OAuth state signature mismatch");
        return None;
    }

    let issued = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_millis.saturating_sub(issued) > STATE_TTL_MILLIS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}

fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/strava/callback", scheme, host)
}

/// Start OAuth flow: redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .filter(|url| is_allowed_frontend(url, &state.config.frontend_url))
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = encode_state(&frontend_url, now_millis()?, &state.config.oauth_state_key)?;

    let auth_url = format!(
        "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
        state.config.strava_oauth_base,
        state.config.strava_client_id,
        urlencoding::encode(&callback_url(&headers)),
        OAUTH_SCOPES,
        oauth_state
    );

    tracing::info!(frontend_url = %frontend_url, "Starting OAuth flow");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: exchange the code, store the user, set the session cookie.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url =
        verify_and_decode_state(&params.state, &state.config.oauth_state_key, now_millis()?)
            .ok_or_else(|| AppError::BadRequest("Invalid OAuth state".to_string()))?;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let oauth_result = state.strava_service.handle_oauth_callback(&code).await?;

    tracing::info!(
        athlete_id = oauth_result.athlete_id,
        firstname = %oauth_result.firstname,
        "OAuth successful"
    );

    let jwt = create_jwt(oauth_result.athlete_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = frontend_url.starts_with("https://");
    let jar = jar.add(session_cookie(jwt, secure));

    Ok((jar, Redirect::temporary(&format!("{}/callback", frontend_url))))
}

/// Clear the session cookie and return to the frontend.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(removal_cookie()),
        Redirect::temporary(&state.config.frontend_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const ISSUED: u128 = 1_700_000_000_000;

    #[test]
    fn test_state_round_trip() {
        let encoded = encode_state("https://example.com", ISSUED, SECRET).unwrap();
        assert_eq!(
            verify_and_decode_state(&encoded, SECRET, ISSUED + 1000),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_state_url_with_pipe() {
        let encoded = encode_state("http://localhost:5173/a|b", ISSUED, SECRET).unwrap();
        assert_eq!(
            verify_and_decode_state(&encoded, SECRET, ISSUED),
            Some("http://localhost:5173/a|b".to_string())
        );
    }

    #[test]
    fn test_state_invalid_signature() {
        let payload = format!("https://example.com|{:x}", ISSUED);
        let encoded = URL_SAFE_NO_PAD.encode(format!("{}|deadbeef", payload));
        assert_eq!(verify_and_decode_state(&encoded, SECRET, ISSUED), None);

        let not_hex = URL_SAFE_NO_PAD.encode(format!("{}|invalid_signature", payload));
        assert_eq!(verify_and_decode_state(&not_hex, SECRET, ISSUED), None);
    }

    #[test]
    fn test_state_wrong_secret() {
        let encoded = encode_state("https://example.com", ISSUED, SECRET).unwrap();
        assert_eq!(verify_and_decode_state(&encoded, b"wrong_key", ISSUED), None);
    }

    #[test]
    fn test_state_expired() {
        let encoded = encode_state("https://example.com", ISSUED, SECRET).unwrap();
        assert_eq!(
            verify_and_decode_state(&encoded, SECRET, ISSUED + STATE_TTL_MILLIS + 1),
            None
        );
    }

    #[test]
    fn test_state_malformed() {
        let encoded = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_and_decode_state(&encoded, SECRET, ISSUED), None);
        assert_eq!(verify_and_decode_state("%%%", SECRET, ISSUED), None);
    }

    #[test]
    fn test_allowed_frontend() {
        let configured = "https://stride.example.com";
        assert!(is_allowed_frontend(configured, configured));
        assert!(is_allowed_frontend("http://localhost:5173", configured));
        assert!(!is_allowed_frontend("https://evil.example.com", configured));
    }
}
