//! Ollama-backed [`GenerationService`] over the daemon's plain HTTP API.

use crate::llm::service::{ConnectionState, ConnectionStatus, GenerationOptions, GenerationService};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaService {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateRequestOptions,
}

#[derive(Serialize)]
struct GenerateRequestOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    #[serde(default)]
    name: String,
}

impl OllamaService {
    pub fn new(base_url: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Provider(format!("Ollama client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl GenerationService for OllamaService {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateRequestOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .timeout(GENERATE_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "Ollama returned HTTP {status} for model '{}'",
                self.model
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Ollama returned malformed JSON: {e}")))?;
        Ok(body.response)
    }

    async fn probe(&self) -> ConnectionStatus {
        let url = format!("{}/api/tags", self.base_url);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                let models = response
                    .json::<TagsResponse>()
                    .await
                    .map(|tags| tags.models)
                    .unwrap_or_default();
                let known = models.iter().any(|m| m.name == self.model);
                let message = if known {
                    format!("Ollama reachable, model '{}' available", self.model)
                } else {
                    format!(
                        "Ollama reachable ({} models), model '{}' not listed",
                        models.len(),
                        self.model
                    )
                };
                ConnectionStatus {
                    state: ConnectionState::Connected,
                    message,
                }
            }
            Ok(response) => ConnectionStatus {
                state: ConnectionState::Error,
                message: format!("Ollama returned HTTP {} on /api/tags", response.status()),
            },
            Err(e) if e.is_timeout() => ConnectionStatus {
                state: ConnectionState::Timeout,
                message: "Ollama probe timed out".to_string(),
            },
            Err(e) if e.is_connect() => ConnectionStatus {
                state: ConnectionState::Disconnected,
                message: format!("Ollama unreachable at {}", self.base_url),
            },
            Err(e) => ConnectionStatus {
                state: ConnectionState::Error,
                message: format!("Ollama probe failed: {e}"),
            },
        }
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}
