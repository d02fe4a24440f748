//! Symptom analyzer — one schema-constrained request per call, validated into
//! a [`SymptomAnalysisResult`].
//!
//! Flow:
//! 1. Reject empty input (no backend call)
//! 2. Short-circuit when the backend is unavailable
//! 3. Send the triage prompt with the response schema
//! 4. Parse and validate the JSON payload
//!
//! No retries. Anything that does not validate is `MalformedResponse`; there is
//! no fallback urgency.

use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::error::AnalysisError;
use crate::llm::{BackendClient, ChatMessage, CompletionRequest};

use super::model::{SymptomAnalysisResult, response_schema};

/// Placeholder replaced by the visitor's description in the prompt template.
pub const SYMPTOMS_PLACEHOLDER: &str = "{symptoms}";

/// Default triage prompt.
pub const DEFAULT_TRIAGE_TEMPLATE: &str = "Analyze the following symptoms and provide a structured assessment for a telemedicine triage: \"{symptoms}\"";

/// Temperature for triage (deterministic-ish).
const TRIAGE_TEMPERATURE: f32 = 0.2;

/// Analyzer settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Prompt template containing [`SYMPTOMS_PLACEHOLDER`].
    pub template: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TRIAGE_TEMPLATE.to_string(),
            temperature: TRIAGE_TEMPERATURE,
            max_tokens: 1024,
        }
    }
}

impl From<&AssistantConfig> for AnalyzerConfig {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            max_tokens: config.analysis_max_tokens,
            ..Self::default()
        }
    }
}

/// Issues symptom triage requests.
#[derive(Debug, Clone, Default)]
pub struct SymptomAnalyzer {
    config: AnalyzerConfig,
}

impl SymptomAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyze a free-text symptom description.
    pub async fn analyze(
        &self,
        client: &BackendClient,
        free_text: &str,
    ) -> Result<SymptomAnalysisResult, AnalysisError> {
        if free_text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let Some(llm) = client.provider() else {
            debug!("Symptom analysis requested without a backend");
            return Err(AnalysisError::BackendUnavailable);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_format_instructions()),
            ChatMessage::user(self.render_prompt(free_text)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_response_schema(response_schema());

        let response = llm
            .complete(request)
            .await
            .map_err(AnalysisError::RequestFailed)?;

        let result = parse_analysis_response(&response.content).inspect_err(|e| {
            warn!(
                raw_response = %response.content,
                error = %e,
                "Symptom analysis response failed validation"
            );
        })?;

        info!(
            urgency = %result.urgency,
            service = %result.recommended_service,
            output_tokens = response.output_tokens,
            "Symptom analysis complete"
        );
        Ok(result)
    }

    fn render_prompt(&self, free_text: &str) -> String {
        self.config.template.replace(SYMPTOMS_PLACEHOLDER, free_text)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Output-format rules for backends without native schema support.
fn build_format_instructions() -> String {
    "You are a telemedicine triage assistant. You never give a diagnosis.\n\n\
     Respond with ONLY a JSON object with exactly these string fields:\n\
     {\"assessment\": \"...\", \"urgency\": \"...\", \"recommendedService\": \"...\", \"disclaimer\": \"...\"}\n\n\
     Rules:\n\
     - assessment: a brief, empathetic summary of the reported symptoms\n\
     - urgency: exactly one of LOW, MEDIUM, HIGH, EMERGENCY\n\
     - recommendedService: one of Primary Care, Urgent Care, Mental Health, Specialist\n\
     - disclaimer: a mandatory medical disclaimer"
        .to_string()
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse and validate a raw analysis payload.
pub fn parse_analysis_response(raw: &str) -> Result<SymptomAnalysisResult, AnalysisError> {
    let json_str = strip_code_fence(raw);
    if json_str.is_empty() {
        return Err(AnalysisError::MalformedResponse {
            reason: "empty response".to_string(),
        });
    }

    serde_json::from_str(json_str).map_err(|e| {
        let reason = if e.is_data() {
            format!("schema violation: {e}")
        } else {
            format!("invalid JSON: {e}")
        };
        AnalysisError::MalformedResponse { reason }
    })
}

/// Unwrap a payload sent as a single markdown code block.
///
/// Only a block spanning the whole payload is unwrapped; JSON embedded in
/// prose is left as is and fails validation.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, or nothing).
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
