//! LLM provider abstraction
//!
//! The rest of the crate talks to language models through two layers:
//! [`GenerationService`] is the raw provider seam (one implementation per
//! backend), and [`Gateway`] is the facade the pipeline actually holds —
//! it owns default generation options and the per-instance request
//! throttle. Gateways are minted by a [`GatewayFactory`] so the engine can
//! isolate respondents by giving each one a fresh instance.

pub mod anythingllm;
pub mod gateway;
pub mod ollama;
pub mod service;

pub use anythingllm::AnythingLlmService;
pub use gateway::{ConfigGatewayFactory, Gateway, GatewayConfig, GatewayFactory, ProviderConfig};
pub use ollama::OllamaService;
pub use service::{ConnectionState, ConnectionStatus, GenerationOptions, GenerationService};
