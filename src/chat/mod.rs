//! Conversational assistant: sessions, transcript and streamed replies.

pub mod session;
pub mod stream;
pub mod transcript;
pub mod widget;

pub use session::{Session, SessionConfig, SessionManager};
pub use stream::{SendOutcome, StreamEvent, StreamingConsumer, next_event};
pub use transcript::{Message, MessageIndex, MessageRole, Transcript, TranscriptEvent};
pub use widget::ChatWidget;
