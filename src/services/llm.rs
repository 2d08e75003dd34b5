// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimal client for OpenAI-compatible chat-completion endpoints, and
//! parsing of the coach's JSON answer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::WorkoutPlan;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM response had no content")]
    EmptyResponse,
    #[error("Could not parse LLM output: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    /// Send one system + user exchange in JSON mode and return the raw
    /// assistant content.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        tracing::debug!(model = %self.model, "LLM completion received");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Locate the JSON payload in model output.
///
/// Handles bare JSON, ```json fenced blocks, and prose around an object.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip an info string such as "json"
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }

    let open = trimmed.find(['{', '['])?;
    let close = trimmed.rfind(['}', ']'])?;
    (close > open).then(|| &trimmed[open..=close])
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecommendationPayload {
    Wrapped { recommendations: Vec<WorkoutPlan> },
    List(Vec<WorkoutPlan>),
    Single(WorkoutPlan),
}

/// Parse the model's answer into workout plans.
pub fn parse_recommendations(text: &str) -> Result<Vec<WorkoutPlan>, LlmError> {
    let json = extract_json(text).ok_or_else(|| LlmError::Parse("no JSON found".to_string()))?;

    let plans = match serde_json::from_str::<RecommendationPayload>(json)
        .map_err(|e| LlmError::Parse(e.to_string()))?
    {
        RecommendationPayload::Wrapped { recommendations } => recommendations,
        RecommendationPayload::List(plans) => plans,
        RecommendationPayload::Single(plan) => vec![plan],
    };

    if plans.is_empty() {
        return Err(LlmError::Parse("empty recommendation list".to_string()));
    }
    Ok(plans)
}
