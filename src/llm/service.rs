//! The provider seam: one trait per backend implementation.

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Effective options for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Reachability classification reported by [`GenerationService::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// The backend answered the probe.
    Connected,
    /// The backend refused or reset the connection.
    Disconnected,
    /// The probe timed out.
    Timeout,
    /// Any other failure (bad status, TLS, DNS).
    Error,
}

/// Result of a connectivity probe. Probing never returns `Err`; failures
/// are encoded in the state so callers can render them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Classified reachability.
    pub state: ConnectionState,
    /// Human-readable detail.
    pub message: String,
}

impl ConnectionStatus {
    /// Whether the backend is usable.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// A text-generation backend.
///
/// Implementations are stateless between calls apart from their HTTP
/// client; throttling and option defaults live in the
/// [`Gateway`](crate::llm::Gateway) wrapper.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Probe backend reachability. Never errors.
    async fn probe(&self) -> ConnectionStatus;

    /// Short provider label for logs and status output.
    fn provider_name(&self) -> &'static str;
}
