//! Gateway facade over a [`GenerationService`].
//!
//! A gateway owns the default generation options and the per-instance
//! throttle: when `min_delay_ms` is set, consecutive calls through the
//! same gateway are spaced at least that far apart. Throttle state is
//! never shared between instances, so two gateways pace independently.

use crate::llm::anythingllm::AnythingLlmService;
use crate::llm::ollama::OllamaService;
use crate::llm::service::{ConnectionStatus, GenerationOptions, GenerationService};
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

// ============= Configuration =============

/// Backend selection plus its connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local Ollama daemon.
    Ollama {
        /// Daemon base URL.
        #[serde(default = "default_ollama_url")]
        base_url: String,
        /// Model name as known to the daemon.
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    /// AnythingLLM workspace chat.
    #[serde(rename = "anythingllm")]
    AnythingLlm {
        /// Instance base URL.
        #[serde(default = "default_anythingllm_url")]
        base_url: String,
        /// API key; sent as both `Authorization: Bearer` and `X-API-Key`.
        #[serde(default)]
        api_key: String,
        /// Workspace slug the chat endpoint is scoped to. Required.
        #[serde(default)]
        workspace_slug: String,
        /// "query" (workspace RAG) or "chat" (plain conversation).
        #[serde(default = "default_anythingllm_mode")]
        mode: String,
        /// Retries on HTTP 429, with exponential backoff.
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_anythingllm_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_anythingllm_mode() -> String {
    "query".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

/// Immutable gateway configuration: provider, option defaults, throttle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backend to talk to.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Default max tokens per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Minimum spacing between calls through one gateway instance, in
    /// milliseconds. Zero disables throttling.
    #[serde(default)]
    pub min_delay_ms: u64,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            min_delay_ms: 0,
        }
    }
}

// ============= Gateway =============

/// The handle the pipeline holds for all generation calls.
pub struct Gateway {
    service: Box<dyn GenerationService>,
    options: GenerationOptions,
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Gateway {
    /// Wrap a service with option defaults and an idle throttle.
    pub fn new(service: Box<dyn GenerationService>, options: GenerationOptions, min_delay_ms: u64) -> Self {
        Self {
            service,
            options,
            min_delay: Duration::from_millis(min_delay_ms),
            last_call: Mutex::new(None),
        }
    }

    /// Generate with the gateway's default options.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with(prompt, None, None).await
    }

    /// Generate with per-call overrides of temperature and max tokens.
    pub async fn generate_with(
        &self,
        prompt: &str,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.throttle().await;
        let options = GenerationOptions {
            temperature: temperature.unwrap_or(self.options.temperature),
            max_tokens: max_tokens.unwrap_or(self.options.max_tokens),
        };
        self.service.generate(prompt, &options).await
    }

    /// Probe the backend. Never errors.
    pub async fn check_connection(&self) -> ConnectionStatus {
        self.service.probe().await
    }

    /// Backend label for logs and status output.
    pub fn provider_name(&self) -> &'static str {
        self.service.provider_name()
    }

    /// Sleep until `min_delay` has elapsed since this instance's previous
    /// call. The lock is held across the sleep so concurrent callers on
    /// one gateway are also spaced out.
    async fn throttle(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ============= Factory =============

/// Mints gateways. The engine creates a fresh instance per respondent and
/// one more for synthesis, so no conversational or pacing state leaks
/// between respondents.
pub trait GatewayFactory: Send + Sync {
    /// Build a new, independent gateway.
    fn create(&self) -> Result<Gateway>;
}

/// Factory backed by a [`GatewayConfig`].
#[derive(Debug, Clone)]
pub struct ConfigGatewayFactory {
    config: GatewayConfig,
}

impl ConfigGatewayFactory {
    /// Validate the config once up front; the per-call `create` then
    /// cannot fail on missing parameters.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if let ProviderConfig::AnythingLlm { workspace_slug, .. } = &config.provider {
            if workspace_slug.trim().is_empty() {
                return Err(AppError::Configuration(
                    "anythingllm provider requires a workspace_slug".to_string(),
                ));
            }
        }
        Ok(Self { config })
    }
}

impl GatewayFactory for ConfigGatewayFactory {
    fn create(&self) -> Result<Gateway> {
        let service: Box<dyn GenerationService> = match &self.config.provider {
            ProviderConfig::Ollama { base_url, model } => {
                Box::new(OllamaService::new(base_url.clone(), model.clone())?)
            }
            ProviderConfig::AnythingLlm {
                base_url,
                api_key,
                workspace_slug,
                mode,
                max_retries,
            } => Box::new(AnythingLlmService::new(
                base_url.clone(),
                api_key.clone(),
                workspace_slug.clone(),
                mode.clone(),
                *max_retries,
            )?),
        };

        let options = GenerationOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        Ok(Gateway::new(service, options, self.config.min_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_workspace_slug_is_rejected_before_any_call() {
        let config = GatewayConfig {
            provider: ProviderConfig::AnythingLlm {
                base_url: "http://localhost:3001".to_string(),
                api_key: String::new(),
                workspace_slug: "   ".to_string(),
                mode: "query".to_string(),
                max_retries: 3,
            },
            ..Default::default()
        };
        let err = ConfigGatewayFactory::new(config).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn gateway_applies_defaults_and_per_call_overrides() {
        use crate::llm::service::MockGenerationService;

        let mut mock = MockGenerationService::new();
        mock.expect_generate()
            .withf(|prompt, options| {
                prompt == "hola" && options.temperature == 0.7 && options.max_tokens == 1000
            })
            .times(1)
            .returning(|_, _| Ok("ok".to_string()));
        mock.expect_generate()
            .withf(|_, options| options.temperature == 0.1 && options.max_tokens == 8)
            .times(1)
            .returning(|_, _| Ok("ok".to_string()));

        let gateway = Gateway::new(Box::new(mock), GenerationOptions::default(), 0);
        gateway.generate("hola").await.unwrap();
        gateway
            .generate_with("hola", Some(0.1), Some(8))
            .await
            .unwrap();
    }

    #[test]
    fn provider_config_deserializes_tagged() {
        let config: GatewayConfig = toml::from_str(
            r#"
            min_delay_ms = 250

            [provider]
            provider = "ollama"
            model = "llama3.2:latest"
            "#,
        )
        .unwrap();
        assert_eq!(config.min_delay_ms, 250);
        assert!(matches!(config.provider, ProviderConfig::Ollama { .. }));
        assert_eq!(config.temperature, 0.7);
    }
}
