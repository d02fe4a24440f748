//! Chat sessions bound to a fixed system policy.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::config::AssistantConfig;
use crate::error::LlmError;
use crate::llm::{BackendClient, ChatMessage, ChunkStream, CompletionRequest, LlmProvider};

/// Settings applied to every session a manager opens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Policy text sent as the system instruction.
    pub system_policy: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl From<&AssistantConfig> for SessionConfig {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            system_policy: config.system_policy.clone(),
            temperature: config.chat_temperature,
            max_tokens: config.chat_max_tokens,
        }
    }
}

/// Opens chat sessions. Holds no per-message state.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Open a session, or `None` when the backend is unavailable.
    pub fn create_session(&self, client: &BackendClient) -> Option<Session> {
        let provider = client.provider()?;
        let session = Session {
            id: Uuid::new_v4(),
            provider: Arc::clone(provider),
            system_policy: self.config.system_policy.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            history: Mutex::new(Vec::new()),
        };

        info!(
            session_id = %session.id,
            model = provider.model_name(),
            "Opened chat session"
        );
        Some(session)
    }
}

/// Backend conversation context for one widget instance.
///
/// The policy never changes after creation. The history of completed turns is
/// the backend-side context and is not visible to callers.
pub struct Session {
    id: Uuid,
    provider: Arc<dyn LlmProvider>,
    system_policy: String,
    temperature: Option<f32>,
    max_tokens: u32,
    history: Mutex<Vec<ChatMessage>>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn system_policy(&self) -> &str {
        &self.system_policy
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Request a streamed reply to `user_text` in the context of prior turns.
    pub async fn stream_reply(&self, user_text: &str) -> Result<ChunkStream, LlmError> {
        let request = {
            let history = self.history.lock().await;
            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(ChatMessage::system(&self.system_policy));
            messages.extend(history.iter().cloned());
            messages.push(ChatMessage::user(user_text));

            let mut request = CompletionRequest::new(messages).with_max_tokens(self.max_tokens);
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }
            request
        };

        self.provider.stream(request).await
    }

    /// Remember a completed exchange so later replies see it.
    pub(crate) async fn record_turn(&self, user_text: &str, reply: &str) {
        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(user_text));
        history.push(ChatMessage::assistant(reply));
    }

    /// Number of completed exchanges.
    pub async fn turn_count(&self) -> usize {
        self.history.lock().await.len() / 2
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("model", &self.provider.model_name())
            .finish_non_exhaustive()
    }
}
