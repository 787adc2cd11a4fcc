//! AnythingLLM-backed [`GenerationService`] over the workspace chat API.
//!
//! AnythingLLM installations are loose about response schemas and often
//! tunnel upstream provider failures through HTTP 200/500 bodies of the
//! form `{"type": "abort", "error": "..."}`. Parsing here is accordingly
//! lenient: the reply text is taken from the first of several known field
//! names, the abort shape is detected before status handling, and 429s are
//! retried with bounded exponential backoff. Generation options are
//! configured workspace-side, so per-call temperature and token limits are
//! accepted and ignored.

use crate::llm::service::{ConnectionState, ConnectionStatus, GenerationOptions, GenerationService};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Field names a workspace chat reply may carry its text under.
const REPLY_FIELDS: &[&str] = &["textResponse", "response", "message", "answer", "text"];

/// Workspace replies meaning "query mode found no relevant chunks"; the
/// call is retried in chat mode so the LLM answers anyway.
const NO_RELEVANT_INFO_NEEDLES: &[&str] = &[
    "there is no relevant information in this workspace",
    "no relevant information in this workspace",
    "no relevant information",
];

#[derive(Debug)]
pub struct AnythingLlmService {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    workspace_slug: String,
    mode: String,
    max_retries: u32,
}

enum CallOutcome {
    Text(String),
    RateLimited(String),
    Failed(AppError),
}

impl AnythingLlmService {
    pub fn new(
        base_url: String,
        api_key: String,
        workspace_slug: String,
        mode: String,
        max_retries: u32,
    ) -> Result<Self> {
        let slug = workspace_slug.trim().to_string();
        if slug.is_empty() {
            return Err(AppError::Configuration(
                "anythingllm provider requires a workspace_slug".to_string(),
            ));
        }
        let mode = match mode.trim().to_lowercase().as_str() {
            "chat" => "chat".to_string(),
            _ => "query".to_string(),
        };
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Provider(format!("AnythingLLM client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            workspace_slug: slug,
            mode,
            max_retries,
        })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/api/v1/workspace/{}/chat",
            self.base_url, self.workspace_slug
        )
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            // Both header styles are accepted depending on the install.
            request
                .bearer_auth(&self.api_key)
                .header("X-API-Key", &self.api_key)
        }
    }

    async fn chat_once(&self, prompt: &str, mode: &str) -> CallOutcome {
        let payload = serde_json::json!({ "message": prompt, "mode": mode });
        let response = match self
            .authed(self.http.post(self.chat_url()))
            .timeout(GENERATE_TIMEOUT)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return CallOutcome::Failed(AppError::Provider(format!(
                    "AnythingLLM request failed: {e}"
                )))
            }
        };

        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        let body = parse_body(&raw);

        // Upstream failures are tunneled as {"type": "abort", "error": "..."}
        // regardless of HTTP status.
        if let Some(abort) = abort_error(&body) {
            if is_rate_limit(abort) {
                return CallOutcome::RateLimited(format!("AnythingLLM abort: {abort}"));
            }
            return CallOutcome::Failed(AppError::Provider(format!("AnythingLLM abort: {abort}")));
        }

        if status.as_u16() == 429 {
            return CallOutcome::RateLimited("AnythingLLM rate limit (429)".to_string());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return CallOutcome::Failed(AppError::Provider(
                "AnythingLLM rejected the API key (check key and permissions)".to_string(),
            ));
        }
        if status.as_u16() == 404 {
            return CallOutcome::Failed(AppError::Provider(format!(
                "AnythingLLM chat endpoint not found (check workspace_slug '{}')",
                self.workspace_slug
            )));
        }
        if !status.is_success() {
            return CallOutcome::Failed(AppError::Provider(format!(
                "AnythingLLM returned HTTP {status}"
            )));
        }

        match reply_text(&body) {
            Some(text) => CallOutcome::Text(text),
            // Unknown-but-successful shape: surface it verbatim rather
            // than failing the whole run.
            None => CallOutcome::Text(body.to_string()),
        }
    }

    /// One chat call with bounded retries on rate limiting.
    async fn chat_retrying(&self, prompt: &str, mode: &str) -> Result<String> {
        for attempt in 0..=self.max_retries {
            match self.chat_once(prompt, mode).await {
                CallOutcome::Text(text) => return Ok(text),
                CallOutcome::RateLimited(message) if attempt < self.max_retries => {
                    let backoff = backoff_delay(attempt);
                    tracing::debug!(attempt, ?backoff, %message, "rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                }
                CallOutcome::RateLimited(message) => {
                    return Err(AppError::Provider(message));
                }
                CallOutcome::Failed(err) => return Err(err),
            }
        }
        Err(AppError::Provider(
            "AnythingLLM retries exhausted".to_string(),
        ))
    }
}

fn parse_body(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    // Some routes answer a text/event-stream line even for one-shot chats.
    if let Some(first) = trimmed.lines().next() {
        if let Some(json) = first.strip_prefix("data:") {
            if let Ok(value) = serde_json::from_str::<Value>(json.trim()) {
                return value;
            }
        }
    }
    Value::String(trimmed.to_string())
}

fn abort_error(body: &Value) -> Option<&str> {
    if body.get("type").and_then(Value::as_str) == Some("abort") {
        body.get("error").and_then(Value::as_str)
    } else {
        None
    }
}

fn reply_text(body: &Value) -> Option<String> {
    let scan = |value: &Value| {
        REPLY_FIELDS.iter().find_map(|field| {
            value
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    };
    if let Value::String(s) = body {
        if s.trim().is_empty() {
            return None;
        }
        return Some(s.clone());
    }
    scan(body).or_else(|| body.get("data").and_then(|inner| scan(inner)))
}

fn is_rate_limit(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("429")
        || m.contains("too many requests")
        || m.contains("rate limit")
        || m.contains("ratelimit")
}

fn is_no_relevant_info(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    NO_RELEVANT_INFO_NEEDLES.iter().any(|n| t.contains(n))
}

/// Capped exponential backoff with a little jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let jitter: f64 = rand::rng().random::<f64>() * 0.2;
    let seconds = (0.6 * f64::from(2u32.saturating_pow(attempt.min(8)))) + jitter;
    Duration::from_secs_f64(seconds.min(8.0))
}

#[async_trait]
impl GenerationService for AnythingLlmService {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        let text = self.chat_retrying(prompt, &self.mode).await?;

        // Query mode with an empty workspace answers a canned "no relevant
        // information" line; fall back to chat mode so the model answers.
        if self.mode == "query" && is_no_relevant_info(&text) {
            match self.chat_retrying(prompt, "chat").await {
                Ok(fallback) => return Ok(fallback),
                Err(e) => {
                    tracing::warn!(error = %e, "chat-mode fallback failed, keeping query reply");
                    return Ok(text);
                }
            }
        }
        Ok(text)
    }

    async fn probe(&self) -> ConnectionStatus {
        let url = format!("{}/api/docs", self.base_url);
        match self
            .authed(self.http.get(&url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ConnectionStatus {
                state: ConnectionState::Connected,
                message: format!(
                    "AnythingLLM reachable, workspace '{}'",
                    self.workspace_slug
                ),
            },
            Ok(response) => ConnectionStatus {
                state: ConnectionState::Error,
                message: format!(
                    "AnythingLLM returned HTTP {} on /api/docs",
                    response.status()
                ),
            },
            Err(e) if e.is_timeout() => ConnectionStatus {
                state: ConnectionState::Timeout,
                message: "AnythingLLM probe timed out".to_string(),
            },
            Err(e) if e.is_connect() => ConnectionStatus {
                state: ConnectionState::Disconnected,
                message: format!("AnythingLLM unreachable at {}", self.base_url),
            },
            Err(e) => ConnectionStatus {
                state: ConnectionState::Error,
                message: format!("AnythingLLM probe failed: {e}"),
            },
        }
    }

    fn provider_name(&self) -> &'static str {
        "anythingllm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_text_scans_known_fields_and_nested_data() {
        let body = serde_json::json!({"textResponse": "hola"});
        assert_eq!(reply_text(&body).as_deref(), Some("hola"));

        let body = serde_json::json!({"data": {"answer": "nested"}});
        assert_eq!(reply_text(&body).as_deref(), Some("nested"));

        let body = serde_json::json!({"textResponse": "   ", "response": "fallback"});
        assert_eq!(reply_text(&body).as_deref(), Some("fallback"));
    }

    #[test]
    fn abort_body_is_detected_before_status_handling() {
        let body = parse_body(r#"{"type":"abort","error":"429 quota exceeded"}"#);
        let abort = abort_error(&body).unwrap();
        assert!(is_rate_limit(abort));
    }

    #[test]
    fn event_stream_first_line_is_parsed() {
        let body = parse_body("data: {\"textResponse\": \"streamed\"}\n\n");
        assert_eq!(reply_text(&body).as_deref(), Some("streamed"));
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in 0..12 {
            assert!(backoff_delay(attempt) <= Duration::from_secs(8));
        }
    }

    #[test]
    fn blank_slug_is_a_configuration_error() {
        let err = AnythingLlmService::new(
            "http://localhost:3001".to_string(),
            String::new(),
            "  ".to_string(),
            "query".to_string(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
