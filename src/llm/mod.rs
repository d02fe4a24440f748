//! LLM integration for MediBot.
//!
//! Supports:
//! - **Gemini**: the default backend, with native JSON-schema output
//! - **Anthropic** and **OpenAI**: plain completions and streaming
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    Gemini,
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::InvalidValue {
                key: "MEDIBOT_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected gemini, anthropic or openai)"),
            }),
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Gemini => create_gemini_provider(config),
        LlmBackend::Anthropic => create_anthropic_provider(config),
        LlmBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_gemini_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;

    let client: rig::client::Client<gemini::client::GeminiExt> =
        gemini::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "gemini".to_string(),
                reason: format!("Failed to create Gemini client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(
        model,
        &config.model,
        LlmBackend::Gemini,
    )))
}

fn create_anthropic_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(
        model,
        &config.model,
        LlmBackend::Anthropic,
    )))
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(
        model,
        &config.model,
        LlmBackend::OpenAi,
    )))
}

/// Process-lifetime handle to the AI backend.
///
/// Built once at startup and passed by reference to everything that talks to
/// the backend. `Unavailable` is permanent: there is no reinitialization or
/// credential rotation.
#[derive(Clone)]
pub enum BackendClient {
    Available(Arc<dyn LlmProvider>),
    Unavailable,
}

impl BackendClient {
    /// Build the client from an optional credential.
    ///
    /// A missing or blank credential, or any construction failure, yields
    /// `Unavailable`. Never returns an error.
    pub fn initialize(
        backend: LlmBackend,
        api_key: Option<&SecretString>,
        model: &str,
    ) -> Self {
        let Some(api_key) = api_key.filter(|k| !k.expose_secret().trim().is_empty()) else {
            tracing::warn!(backend = %backend, "No API key configured, AI assistant disabled");
            return Self::Unavailable;
        };

        let config = LlmConfig {
            backend,
            api_key: api_key.clone(),
            model: model.to_string(),
        };
        match create_provider(&config) {
            Ok(provider) => Self::Available(provider),
            Err(e) => {
                tracing::error!(backend = %backend, error = %e, "Failed to initialize AI backend");
                Self::Unavailable
            }
        }
    }

    /// Wrap an already-built provider.
    pub fn from_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self::Available(provider)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        match self {
            Self::Available(provider) => Some(provider),
            Self::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(provider) => f
                .debug_tuple("Available")
                .field(&provider.model_name())
                .finish(),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}
