//! Chat widget controller — owns one session and one transcript and keeps
//! at most one reply in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::SubmitError;
use crate::llm::BackendClient;

use super::session::{Session, SessionManager};
use super::stream::{SendOutcome, StreamingConsumer};
use super::transcript::Transcript;

/// One mounted chat widget.
pub struct ChatWidget {
    session: Option<Session>,
    transcript: Arc<Transcript>,
    consumer: StreamingConsumer,
    in_flight: AtomicBool,
}

/// Clears the busy flag when the send finishes or its future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatWidget {
    /// Mount a widget: open its session and seed the transcript with `greeting`.
    pub fn mount(manager: &SessionManager, client: &BackendClient, greeting: &str) -> Self {
        let session = manager.create_session(client);
        if session.is_none() {
            debug!("Chat widget mounted without a session");
        }
        Self {
            session,
            transcript: Transcript::with_greeting(greeting),
            consumer: StreamingConsumer::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a reply is currently streaming (input should be disabled).
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        Arc::clone(&self.transcript)
    }

    /// Submit user input.
    ///
    /// Rejects whitespace-only input, a missing session and a second submit
    /// while a reply is streaming. Backend failures are not errors here; they
    /// land in the transcript.
    pub async fn submit(&self, input: &str) -> Result<SendOutcome, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(SubmitError::Unavailable);
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(session_id = %session.id(), "Submit rejected, reply in flight");
            return Err(SubmitError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        Ok(self.consumer.send(session, &self.transcript, input).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;
    use crate::chat::session::SessionConfig;
    use crate::chat::transcript::Message;
    use crate::error::LlmError;
    use crate::llm::{
        ChunkStream, CompletionRequest, CompletionResponse, LlmProvider, StreamChunk,
    };

    /// Streams "slow" then "reply" with a pause between the two.
    struct SlowLlm;

    #[async_trait]
    impl LlmProvider for SlowLlm {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            unimplemented!("chat only streams")
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream, LlmError> {
            let chunks = futures::stream::iter(["slow ", "reply"]).then(|text| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, LlmError>(StreamChunk::text(text))
            });
            Ok(Box::pin(chunks))
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig {
            system_policy: "policy".into(),
            temperature: None,
            max_tokens: 64,
        })
    }

    #[tokio::test]
    async fn mount_seeds_greeting() {
        let widget = ChatWidget::mount(&manager(), &BackendClient::Unavailable, "Welcome!");
        assert_eq!(
            widget.transcript().snapshot().await,
            vec![Message::model("Welcome!")]
        );
    }

    #[tokio::test]
    async fn unavailable_backend_rejects_submit() {
        let widget = ChatWidget::mount(&manager(), &BackendClient::Unavailable, "Hi");
        assert!(!widget.is_available());
        assert_eq!(widget.submit("hello").await, Err(SubmitError::Unavailable));
        assert_eq!(widget.transcript().len().await, 1);
    }

    #[tokio::test]
    async fn empty_input_rejected_before_session_check() {
        let widget = ChatWidget::mount(&manager(), &BackendClient::Unavailable, "Hi");
        assert_eq!(widget.submit("   ").await, Err(SubmitError::EmptyInput));
    }

    #[tokio::test]
    async fn second_submit_while_streaming_is_busy() {
        let client = BackendClient::from_provider(Arc::new(SlowLlm));
        let widget = Arc::new(ChatWidget::mount(&manager(), &client, "Hi"));

        let first = {
            let widget = Arc::clone(&widget);
            tokio::spawn(async move { widget.submit("first").await })
        };

        // Wait until the first send has taken the slot.
        while !widget.is_busy() {
            tokio::task::yield_now().await;
        }
        assert_eq!(widget.submit("second").await, Err(SubmitError::Busy));

        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_completed());
        assert!(!widget.is_busy());

        let snapshot = widget.transcript().snapshot().await;
        assert_eq!(
            snapshot,
            vec![
                Message::model("Hi"),
                Message::user("first"),
                Message::model("slow reply"),
            ]
        );

        // Free again after completion
        assert!(widget.submit("third").await.unwrap().is_completed());
    }
}
