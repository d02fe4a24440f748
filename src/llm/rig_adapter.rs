//! Bridges rig-core completion models to [`LlmProvider`].

use async_trait::async_trait;
use futures::StreamExt;
use rig::completion::{AssistantContent, CompletionModel, Message as RigMessage};
use rig::streaming::StreamedAssistantContent;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, ChunkStream, CompletionRequest, CompletionResponse, LlmProvider, Role,
    StreamChunk,
};
use crate::llm::LlmBackend;

/// Wraps a rig `CompletionModel`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    backend: LlmBackend,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, backend: LlmBackend) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            backend,
        }
    }

    fn provider(&self) -> &'static str {
        self.backend.as_str()
    }

    fn build_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<rig::completion::CompletionRequestBuilder<M>, LlmError> {
        let mut history: Vec<RigMessage> = request
            .messages
            .iter()
            .filter_map(to_rig_message)
            .collect();

        let Some(prompt) = history.pop() else {
            return Err(LlmError::RequestFailed {
                provider: self.provider().to_string(),
                reason: "request has no user or assistant messages".to_string(),
            });
        };

        let mut builder = self.model.completion_request(prompt).messages(history);

        if let Some(preamble) = fold_preamble(&request.messages) {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(params) = additional_params(self.backend, request.response_schema.as_ref()) {
            builder = builder.additional_params(params);
        }

        Ok(builder)
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
    M::StreamingResponse: 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let builder = self.build_request(&request)?;
        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.provider().to_string(),
            reason: e.to_string(),
        })?;

        let texts: Vec<&str> = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider().to_string(),
                reason: "response contained no text content".to_string(),
            });
        }
        let content = texts.concat();

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, LlmError> {
        let builder = self.build_request(&request)?;
        let provider = self.provider();
        let stream = builder.stream().await.map_err(|e| LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(provider, model = %self.model_name, "Opened provider stream");

        let chunks = stream.map(move |item| match item {
            Ok(StreamedAssistantContent::Text(text)) => Ok(StreamChunk::text(text.text)),
            // Reasoning, tool calls and the final usage record carry no reply text.
            Ok(_) => Ok(StreamChunk::empty()),
            Err(e) => Err(LlmError::StreamFailed {
                provider: provider.to_string(),
                reason: e.to_string(),
            }),
        });

        Ok(Box::pin(chunks))
    }
}

/// Provider-specific request parameters.
///
/// rig's Gemini model only forwards `max_tokens` and `temperature` when a
/// `generationConfig` object is present, so Gemini always gets one.
fn additional_params(
    backend: LlmBackend,
    schema: Option<&serde_json::Value>,
) -> Option<serde_json::Value> {
    match backend {
        LlmBackend::Gemini => {
            let mut generation_config = serde_json::Map::new();
            if let Some(schema) = schema {
                generation_config.insert(
                    "responseMimeType".to_string(),
                    serde_json::Value::from("application/json"),
                );
                generation_config.insert("responseSchema".to_string(), schema.clone());
            }
            Some(serde_json::json!({ "generationConfig": generation_config }))
        }
        // Other backends rely on the prompt wording alone.
        LlmBackend::Anthropic | LlmBackend::OpenAi => None,
    }
}

/// System messages go into the preamble; rig exposes a single field for it.
fn fold_preamble(messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System && !m.content.trim().is_empty())
        .map(|m| m.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn to_rig_message(message: &ChatMessage) -> Option<RigMessage> {
    match message.role {
        Role::System => None,
        Role::User => Some(RigMessage::user(message.content.clone())),
        Role::Assistant => Some(RigMessage::assistant(message.content.clone())),
    }
}
