//! Gemini `generateContent` adapter.
//!
//! Implements [`CompletionService`] over HTTP with `reqwest`:
//!
//! ```text
//! POST {base_url}/v1beta/models/{model}:generateContent
//! x-goog-api-key: <key>
//! ```
//!
//! Text parts are sent as `{"text": ...}`, blobs as
//! `{"inlineData": {"mimeType", "data"}}` with base64 data. When the
//! request carries a response schema the body asks for
//! `application/json` output constrained to it.
//!
//! Failures are mapped into [`FailureKind`] here so the retry layer never
//! inspects message text:
//! - HTTP 429 → `RateLimited`
//! - HTTP 503 → `Unavailable`
//! - body mentioning `RESOURCE_EXHAUSTED` / overload → `Overloaded`
//! - anything else (transport errors, empty candidates) → `Fatal`

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use study_forge_core::completion::{
    CompletionError, CompletionRequest, CompletionService, ContentPart, FailureKind,
};

use crate::config::CompletionConfig;

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build the client, reading the API key from the configured
    /// environment variable once.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn from_config(config: &CompletionConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("{} environment variable not set", config.api_key_env)
            })?;
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        )
    }
}

/// JSON body for a `generateContent` call.
pub fn request_body(request: &CompletionRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::Blob { mime_type, data } => json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": STANDARD.encode(data),
                }
            }),
        })
        .collect();

    let config = &request.config;
    let mut generation = json!({
        "temperature": config.temperature,
        "maxOutputTokens": config.max_output_tokens,
    });
    if let Some(budget) = config.thinking_budget {
        generation["thinkingConfig"] = json!({ "thinkingBudget": budget });
    }
    if let Some(schema) = &config.response_schema {
        generation["responseMimeType"] = json!("application/json");
        generation["responseSchema"] = schema.clone();
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation,
    })
}

/// Concatenated text of the first candidate, skipping thought parts.
pub fn reply_text(response: &Value) -> Result<String, CompletionError> {
    let candidate = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates returned");
            CompletionError::fatal(format!("Gemini returned no candidates: {}", reason))
        })?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Ok(text)
}

/// Map a non-success response into a classified error.
fn error_from_response(status: u16, body: &str) -> CompletionError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("");
            let code = error.get("status").and_then(|s| s.as_str()).unwrap_or("");
            Some(format!("{} {}", code, message).trim().to_string())
        })
        .unwrap_or_else(|| body.trim().to_string());
    let message = format!("Gemini API error {}: {}", status, detail);
    CompletionError::new(FailureKind::classify(Some(status), &message), message)
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = request_body(request);
        tracing::debug!(
            model = %request.model,
            prompt_chars = request.prompt_text().len(),
            blob = request.has_blob(),
            json = request.config.wants_json(),
            "calling generateContent"
        );

        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Gemini request failed: {}", e);
                CompletionError::new(FailureKind::classify(None, &message), message)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body_text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::fatal(format!("Invalid Gemini response: {}", e)))?;
        reply_text(&json)
    }
}
