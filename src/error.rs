//! Error types for MediBot, plus the classifier that turns any failure into a
//! user-facing kind.

/// Why a chat turn ended early.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} stream failed: {reason}")]
    StreamFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Misuse of the transcript's update contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("Message {index} cannot be updated (transcript has {len} messages)")]
    InvalidIndex { index: usize, len: usize },
}

/// Failures of a single symptom analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Symptom description is empty")]
    EmptyInput,

    #[error("AI backend is unavailable")]
    BackendUnavailable,

    #[error("Analysis request failed: {0}")]
    RequestFailed(#[source] LlmError),

    #[error("Malformed analysis response: {reason}")]
    MalformedResponse { reason: String },
}

/// Caller-side rejections of a chat submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("Chat assistant is unavailable")]
    Unavailable,

    #[error("A reply is still streaming")]
    Busy,
}

// ── Classification ──────────────────────────────────────────────────

/// Reportable failure kinds shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No credential, or the backend client could not be built.
    BackendUnavailable,
    /// Transport or service failure during a request or stream.
    RequestFailed,
    /// Response arrived but could not be parsed or did not match the schema.
    MalformedResponse,
    /// Caller submitted nothing to work with.
    InvalidInput,
}

impl ErrorKind {
    /// Fixed, non-technical text suitable for direct display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => {
                "Our virtual assistant is offline at the moment. Please call our support line or use the Contact form."
            }
            Self::RequestFailed => {
                "I apologize, but I am having trouble connecting right now. Please try calling our support line."
            }
            Self::MalformedResponse => {
                "We couldn't complete your assessment. Please try again, or call our support line to speak with a clinician."
            }
            Self::InvalidInput => "Please describe your symptoms before requesting an assessment.",
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backend_unavailable",
            Self::RequestFailed => "request_failed",
            Self::MalformedResponse => "malformed_response",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure reduced to what the user is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub user_message: &'static str,
}

impl From<ErrorKind> for ClassifiedError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            user_message: kind.user_message(),
        }
    }
}

/// Errors that map onto a reportable [`ErrorKind`].
pub trait Classify: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

impl Classify for LlmError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidResponse { .. } => ErrorKind::MalformedResponse,
            Self::RequestFailed { .. } | Self::StreamFailed { .. } => ErrorKind::RequestFailed,
        }
    }
}

impl Classify for AnalysisError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::InvalidInput,
            Self::BackendUnavailable => ErrorKind::BackendUnavailable,
            Self::RequestFailed(_) => ErrorKind::RequestFailed,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }
}

impl Classify for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Llm(e) => e.kind(),
            // Contract violations are bugs, the user only needs to know the turn failed.
            Self::Transcript(_) => ErrorKind::RequestFailed,
        }
    }
}

/// Classify a raw failure.
///
/// The full error chain is logged here and nowhere else; the returned value
/// only carries the fixed user message for its kind.
pub fn classify<E: Classify + ?Sized>(failure: &E) -> ClassifiedError {
    let kind = failure.kind();
    let mut causes = Vec::new();
    let mut source = failure.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    tracing::warn!(
        kind = %kind,
        error = %failure,
        causes = ?causes,
        "Classified backend failure"
    );
    ClassifiedError::from(kind)
}
