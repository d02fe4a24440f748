//! Configuration types.

use std::path::Path;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default system policy bound to every chat session.
pub const DEFAULT_SYSTEM_POLICY: &str = "\
You are 'MediBot', the virtual assistant for the Mobile Healthcare Initiative.
Your role is to help visitors navigate our telemedicine services, schedule appointments, and provide GENERAL wellness information.

CRITICAL RULES:
1. DO NOT provide specific medical diagnoses. If a user describes serious symptoms, URGE them to call emergency services or visit a hospital immediately.
2. Be professional, empathetic, and concise.
3. Our services include: Primary Care, Mental Health Consultations, Chronic Disease Management, and Specialist Referrals.
4. If asked about pricing: \"Consultations start at $49. We accept most major insurance plans.\"
5. If asked to book: \"Click any 'Book Appointment' button on the page or use the Contact form.\"";

/// First message shown in a fresh chat transcript.
pub const DEFAULT_GREETING: &str = "Welcome to Mobile Healthcare Initiative. I am MediBot, your virtual wellness assistant. How can I help you today?";

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Which backend to talk to.
    pub backend: LlmBackend,
    /// Backend credential. `None` disables the assistant for the process lifetime.
    pub api_key: Option<SecretString>,
    /// Model identifier.
    pub model: String,
    /// System policy text bound to each chat session.
    pub system_policy: String,
    /// Greeting seeded into each new transcript.
    pub greeting: String,
    /// Sampling temperature for chat replies.
    pub chat_temperature: Option<f32>,
    /// Max tokens for chat replies.
    pub chat_max_tokens: u32,
    /// Max tokens for a symptom analysis.
    pub analysis_max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            system_policy: DEFAULT_SYSTEM_POLICY.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            chat_temperature: None,
            chat_max_tokens: 1024,
            analysis_max_tokens: 1024,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from environment variables.
    ///
    /// - `MEDIBOT_API_KEY` (falls back to `GEMINI_API_KEY`, then `API_KEY`)
    /// - `MEDIBOT_BACKEND` — gemini (default), anthropic, openai
    /// - `MEDIBOT_MODEL`
    /// - `MEDIBOT_SYSTEM_POLICY` — inline policy text
    /// - `MEDIBOT_SYSTEM_POLICY_FILE` — policy read from a file
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = ["MEDIBOT_API_KEY", "GEMINI_API_KEY", "API_KEY"]
            .into_iter()
            .find_map(get)
            .map(SecretString::from);

        if let Some(backend) = get("MEDIBOT_BACKEND") {
            config.backend = backend.parse()?;
        }

        if let Some(model) = get("MEDIBOT_MODEL") {
            config.model = model.trim().to_string();
        }

        if let Some(policy) = get("MEDIBOT_SYSTEM_POLICY") {
            config.system_policy = policy;
        } else if let Some(path) = get("MEDIBOT_SYSTEM_POLICY_FILE") {
            config.system_policy = read_policy_file(Path::new(path.trim()))?;
        }

        if let Some(temperature) = get("MEDIBOT_TEMPERATURE") {
            let value: f32 = temperature
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "MEDIBOT_TEMPERATURE".to_string(),
                    message: format!("'{temperature}' is not a number"),
                })?;
            config.chat_temperature = Some(value);
        }

        Ok(config)
    }
}

fn read_policy_file(path: &Path) -> Result<String, ConfigError> {
    let policy = std::fs::read_to_string(path)?;
    if policy.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "MEDIBOT_SYSTEM_POLICY_FILE".to_string(),
            message: format!("{} is empty", path.display()),
        });
    }
    Ok(policy)
}
