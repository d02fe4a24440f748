//! Streaming consumer — folds a streamed reply into the transcript.
//!
//! Flow for one `send`:
//! 1. Append the user message verbatim
//! 2. Append an empty model placeholder
//! 3. Open the reply stream and fold each non-empty delta into the placeholder
//! 4. On failure, append a separate error bubble; the placeholder keeps
//!    whatever text it had accumulated

use futures::StreamExt;
use tracing::{debug, error, info};

use crate::error::{ClassifiedError, Error, LlmError, classify};
use crate::llm::{ChunkStream, StreamChunk};

use super::session::Session;
use super::transcript::{Message, MessageIndex, Transcript};

/// What one wait on the reply stream produced.
#[derive(Debug)]
pub enum StreamEvent {
    /// A chunk arrived. Its delta may be absent or empty.
    Fragment(StreamChunk),
    /// The backend finished the reply.
    Completed,
    /// The transport failed where the next chunk was expected.
    Failed(LlmError),
}

/// Wait for the next event on a reply stream.
pub async fn next_event(stream: &mut ChunkStream) -> StreamEvent {
    match stream.next().await {
        Some(Ok(chunk)) => StreamEvent::Fragment(chunk),
        Some(Err(e)) => StreamEvent::Failed(e),
        None => StreamEvent::Completed,
    }
}

/// How a `send` ended. The transcript already reflects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was whitespace only; the transcript was not touched.
    Rejected,
    /// The reply streamed to completion.
    Completed { reply: MessageIndex, text: String },
    /// The reply failed; an error bubble was appended after the placeholder.
    Failed {
        reply: MessageIndex,
        error_message: MessageIndex,
        error: ClassifiedError,
    },
}

impl SendOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Sends user messages and folds streamed replies into a transcript.
///
/// Concurrent `send` calls on one session are not supported; callers must
/// keep at most one in flight (see `ChatWidget`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingConsumer;

impl StreamingConsumer {
    pub fn new() -> Self {
        Self
    }

    /// Send `user_text` and stream the reply into `transcript`.
    ///
    /// Never fails: every failure path ends with an error bubble in the
    /// transcript.
    pub async fn send(
        &self,
        session: &Session,
        transcript: &Transcript,
        user_text: &str,
    ) -> SendOutcome {
        if user_text.trim().is_empty() {
            debug!(session_id = %session.id(), "Ignoring whitespace-only message");
            return SendOutcome::Rejected;
        }

        transcript.append(Message::user(user_text)).await;
        let reply = transcript.append(Message::model("")).await;

        let mut stream = match session.stream_reply(user_text).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(transcript, reply, &Error::from(e)).await,
        };

        let mut accumulated = String::new();
        let mut fragments = 0usize;

        loop {
            match next_event(&mut stream).await {
                StreamEvent::Fragment(chunk) => {
                    let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) else {
                        continue;
                    };
                    accumulated.push_str(&delta);
                    fragments += 1;

                    if let Err(e) = transcript.update_in_place(reply, accumulated.as_str()).await {
                        // Someone appended behind our back; the slot is closed.
                        error!(
                            session_id = %session.id(),
                            index = reply.get(),
                            error = %e,
                            "Reply slot closed mid-stream"
                        );
                        return self.fail(transcript, reply, &Error::from(e)).await;
                    }
                }
                StreamEvent::Completed => {
                    session.record_turn(user_text, &accumulated).await;
                    info!(
                        session_id = %session.id(),
                        fragments,
                        chars = accumulated.len(),
                        "Reply complete"
                    );
                    return SendOutcome::Completed {
                        reply,
                        text: accumulated,
                    };
                }
                StreamEvent::Failed(e) => {
                    debug!(
                        session_id = %session.id(),
                        fragments,
                        "Reply stream failed"
                    );
                    return self.fail(transcript, reply, &Error::from(e)).await;
                }
            }
        }
    }

    async fn fail(
        &self,
        transcript: &Transcript,
        reply: MessageIndex,
        failure: &Error,
    ) -> SendOutcome {
        let error = classify(failure);
        let error_message = transcript.append(Message::error(error.user_message)).await;
        SendOutcome::Failed {
            reply,
            error_message,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::session::{SessionConfig, SessionManager};
    use crate::chat::transcript::MessageRole;
    use crate::error::ErrorKind;
    use crate::llm::{BackendClient, CompletionRequest, CompletionResponse, LlmProvider};

    /// Scripted stream: yields the given items in order, optionally failing to open.
    struct ScriptedLlm {
        items: Vec<Result<Option<&'static str>, &'static str>>,
        fail_open: bool,
    }

    fn stream_err(reason: &str) -> LlmError {
        LlmError::StreamFailed {
            provider: "scripted".into(),
            reason: reason.into(),
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            unimplemented!("chat only streams")
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream, LlmError> {
            if self.fail_open {
                return Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: "connection refused".into(),
                });
            }
            let items: Vec<Result<StreamChunk, LlmError>> = self
                .items
                .iter()
                .map(|item| match item {
                    Ok(Some(text)) => Ok(StreamChunk::text(*text)),
                    Ok(None) => Ok(StreamChunk::empty()),
                    Err(reason) => Err(stream_err(reason)),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn session_for(llm: ScriptedLlm) -> Session {
        let client = BackendClient::from_provider(Arc::new(llm));
        SessionManager::new(SessionConfig {
            system_policy: "policy".into(),
            temperature: None,
            max_tokens: 128,
        })
        .create_session(&client)
        .unwrap()
    }

    fn texts(items: &[&'static str]) -> Vec<Result<Option<&'static str>, &'static str>> {
        items.iter().map(|t| Ok(Some(*t))).collect()
    }

    #[tokio::test]
    async fn fragments_concatenate_into_one_bubble() {
        let session = session_for(ScriptedLlm {
            items: texts(&["Hello", "", " there", "!"]),
            fail_open: false,
        });
        let transcript = Transcript::new();

        let outcome = StreamingConsumer::new()
            .send(&session, &transcript, "hi")
            .await;

        assert!(outcome.is_completed());
        let snapshot = transcript.snapshot().await;
        assert_eq!(snapshot, vec![Message::user("hi"), Message::model("Hello there!")]);
        assert_eq!(session.turn_count().await, 1);
    }

    #[tokio::test]
    async fn chunks_without_delta_are_ignored() {
        let session = session_for(ScriptedLlm {
            items: vec![Ok(None), Ok(Some("A")), Ok(None), Ok(Some("B"))],
            fail_open: false,
        });
        let transcript = Transcript::new();
        let mut rx = transcript.subscribe();

        StreamingConsumer::new()
            .send(&session, &transcript, "x")
            .await;

        assert_eq!(transcript.last().await.unwrap().text, "AB");

        // user append, placeholder append, two updates
        let mut events = 0;
        while rx.try_recv().is_ok() {
            events += 1;
        }
        assert_eq!(events, 4);
    }

    #[tokio::test]
    async fn zero_fragment_stream_leaves_empty_placeholder() {
        let session = session_for(ScriptedLlm {
            items: vec![],
            fail_open: false,
        });
        let transcript = Transcript::new();

        let outcome = StreamingConsumer::new()
            .send(&session, &transcript, "hello?")
            .await;

        let SendOutcome::Completed { reply, text } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(reply.get(), 1);
        assert!(text.is_empty());
        let snapshot = transcript.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1], Message::model(""));
        assert!(snapshot.iter().all(|m| !m.is_error));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_and_appends_error() {
        let session = session_for(ScriptedLlm {
            items: vec![Ok(Some("Hel")), Err("socket closed")],
            fail_open: false,
        });
        let transcript = Transcript::new();

        let outcome = StreamingConsumer::new()
            .send(&session, &transcript, "hello")
            .await;

        let snapshot = transcript.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1], Message::model("Hel"));
        assert_eq!(
            snapshot[2],
            Message::error(ErrorKind::RequestFailed.user_message())
        );
        assert!(matches!(
            outcome,
            SendOutcome::Failed { ref error, .. } if error.kind == ErrorKind::RequestFailed
        ));
        // Failed turns are not remembered
        assert_eq!(session.turn_count().await, 0);
    }

    /// Streams "Hel" then "lo", appending to the transcript before the second chunk.
    struct InterruptingLlm {
        transcript: Arc<Transcript>,
    }

    #[async_trait]
    impl LlmProvider for InterruptingLlm {
        fn model_name(&self) -> &str {
            "interrupting"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            unimplemented!("chat only streams")
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<ChunkStream, LlmError> {
            let transcript = Arc::clone(&self.transcript);
            let chunks =
                futures::stream::iter([("Hel", false), ("lo", true)]).then(move |(text, interrupt)| {
                    let transcript = Arc::clone(&transcript);
                    async move {
                        if interrupt {
                            transcript.append(Message::user("typed meanwhile")).await;
                        }
                        Ok::<_, LlmError>(StreamChunk::text(text))
                    }
                });
            Ok(Box::pin(chunks))
        }
    }

    #[tokio::test]
    async fn closed_reply_slot_ends_turn_with_error() {
        let transcript = Transcript::new();
        let client = BackendClient::from_provider(Arc::new(InterruptingLlm {
            transcript: Arc::clone(&transcript),
        }));
        let session = SessionManager::new(SessionConfig {
            system_policy: "policy".into(),
            temperature: None,
            max_tokens: 128,
        })
        .create_session(&client)
        .unwrap();

        let outcome = StreamingConsumer::new()
            .send(&session, &transcript, "hello")
            .await;

        let SendOutcome::Failed {
            reply,
            error_message,
            error,
        } = outcome
        else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(error.kind, ErrorKind::RequestFailed);
        assert_eq!(reply.get(), 1);
        assert_eq!(error_message.get(), 3);

        assert_eq!(
            transcript.snapshot().await,
            vec![
                Message::user("hello"),
                Message::model("Hel"),
                Message::user("typed meanwhile"),
                Message::error(ErrorKind::RequestFailed.user_message()),
            ]
        );
        assert_eq!(session.turn_count().await, 0);
    }

    #[tokio::test]
    async fn failure_before_first_fragment_leaves_empty_placeholder() {
        let session = session_for(ScriptedLlm {
            items: vec![],
            fail_open: true,
        });
        let transcript = Transcript::new();

        StreamingConsumer::new()
            .send(&session, &transcript, "hello")
            .await;

        let snapshot = transcript.snapshot().await;
        assert_eq!(snapshot[0], Message::user("hello"));
        assert_eq!(snapshot[1].role, MessageRole::Model);
        assert_eq!(snapshot[1].text, "");
        assert!(!snapshot[1].is_error);
        assert!(snapshot[2].is_error);
    }

    #[tokio::test]
    async fn whitespace_input_is_rejected_untouched() {
        let session = session_for(ScriptedLlm {
            items: texts(&["unused"]),
            fail_open: false,
        });
        let transcript = Transcript::new();

        let outcome = StreamingConsumer::new()
            .send(&session, &transcript, "  \n\t ")
            .await;

        assert_eq!(outcome, SendOutcome::Rejected);
        assert!(transcript.is_empty().await);
    }

    #[tokio::test]
    async fn user_text_is_kept_verbatim() {
        let session = session_for(ScriptedLlm {
            items: texts(&["ok"]),
            fail_open: false,
        });
        let transcript = Transcript::new();

        StreamingConsumer::new()
            .send(&session, &transcript, "  spaced out  ")
            .await;

        assert_eq!(transcript.snapshot().await[0].text, "  spaced out  ");
    }

    #[tokio::test]
    async fn next_event_tags_each_outcome() {
        let mut stream: ChunkStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamChunk::text("a")),
            Err(stream_err("boom")),
        ]));
        assert!(matches!(next_event(&mut stream).await, StreamEvent::Fragment(_)));
        assert!(matches!(next_event(&mut stream).await, StreamEvent::Failed(_)));
        assert!(matches!(next_event(&mut stream).await, StreamEvent::Completed));
    }
}
