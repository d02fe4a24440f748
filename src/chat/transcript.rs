//! Transcript — append-only message log with broadcast to renderers.
//!
//! The only in-place mutation allowed is on the last message, and only while
//! it is a model reply that has not been superseded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use crate::error::TranscriptError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// One bubble in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            is_error: true,
        }
    }
}

/// Stable handle to a transcript slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageIndex(usize);

impl MessageIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for MessageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change notification for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    Appended { index: MessageIndex, message: Message },
    Updated { index: MessageIndex, text: String },
}

/// Ordered conversation log owned by one chat widget.
pub struct Transcript {
    messages: RwLock<Vec<Message>>,
    tx: broadcast::Sender<TranscriptEvent>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            messages: RwLock::new(Vec::new()),
            tx,
        })
    }

    /// Create a transcript seeded with a model greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            messages: RwLock::new(vec![Message::model(greeting)]),
            tx,
        })
    }

    /// Subscribe to append/update events.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.tx.subscribe()
    }

    /// Append a message at the end. Returns the handle of the new slot.
    pub async fn append(&self, message: Message) -> MessageIndex {
        let index = {
            let mut messages = self.messages.write().await;
            messages.push(message.clone());
            MessageIndex(messages.len() - 1)
        };

        debug!(index = index.0, role = ?message.role, is_error = message.is_error, "Transcript append");

        // Ok if nobody is rendering
        let _ = self.tx.send(TranscriptEvent::Appended { index, message });
        index
    }

    /// Replace the text of the open model reply at `index`.
    ///
    /// Fails with `InvalidIndex` unless `index` is the last message, authored by
    /// the model and not an error bubble.
    pub async fn update_in_place(
        &self,
        index: MessageIndex,
        text: impl Into<String>,
    ) -> Result<(), TranscriptError> {
        let text = text.into();
        {
            let mut messages = self.messages.write().await;
            let len = messages.len();
            let is_last = index.0 + 1 == len;
            let slot = messages
                .last_mut()
                .filter(|m| is_last && m.role == MessageRole::Model && !m.is_error);

            let Some(slot) = slot else {
                warn!(index = index.0, len, "Rejected in-place update of a closed slot");
                return Err(TranscriptError::InvalidIndex {
                    index: index.0,
                    len,
                });
            };
            slot.text.clone_from(&text);
        }

        let _ = self.tx.send(TranscriptEvent::Updated { index, text });
        Ok(())
    }

    /// Read-only copy of the transcript in display order.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Last message, if any.
    pub async fn last(&self) -> Option<Message> {
        self.messages.read().await.last().cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
