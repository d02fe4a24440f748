//! CLI front-end — stdin/stdout REPL over one chat widget and one symptom
//! checker.
//!
//! Plain lines go to the chat. Replies stream to stdout as transcript events
//! arrive; diagnostics stay on stderr.

use std::collections::HashMap;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::chat::{ChatWidget, MessageRole, SendOutcome, TranscriptEvent};
use crate::triage::{CheckerState, SymptomAnalysisResult, SymptomChecker};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Analyze(String),
    Transcript,
    Reset,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Chat(line.to_string()));
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let command = match name {
            "analyze" => Self::Analyze(arg.trim().to_string()),
            "transcript" => Self::Transcript,
            "reset" => Self::Reset,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        };
        Some(command)
    }
}

const HELP: &str = "\
Type a message and press Enter to chat.
  /analyze <symptoms>  run the symptom checker
  /reset               clear the symptom checker
  /transcript          print the conversation so far
  /quit                exit";

/// Turns transcript events into incremental terminal output.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    /// Bytes already printed per model message.
    printed: HashMap<usize, usize>,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for `event`, if any. User messages are not echoed.
    pub fn render(&mut self, event: &TranscriptEvent) -> Option<String> {
        match event {
            TranscriptEvent::Appended { message, .. } if message.is_error => {
                Some(format!("\n! {}\n", message.text))
            }
            TranscriptEvent::Appended { index, message } if message.role == MessageRole::Model => {
                self.printed.insert(index.get(), message.text.len());
                Some(format!("medibot> {}", message.text))
            }
            TranscriptEvent::Appended { .. } => None,
            TranscriptEvent::Updated { index, text } => {
                let printed = self.printed.entry(index.get()).or_insert(0);
                let delta = text.get(*printed..).unwrap_or_default();
                *printed = text.len();
                (!delta.is_empty()).then(|| delta.to_string())
            }
        }
    }
}

/// Format a completed assessment for the terminal.
pub fn format_assessment(result: &SymptomAnalysisResult) -> String {
    let mut out = format!(
        "Urgency: {}\nRecommended: {}\n\n{}\n\n{}",
        result.urgency, result.recommended_service, result.assessment, result.disclaimer
    );
    if result.urgency.requires_emergency_care() {
        out.insert_str(0, "!! Call emergency services or go to the nearest hospital now.\n");
    } else if result.urgency.is_urgent() {
        out.insert_str(0, "! Please book a visit today.\n");
    }
    out
}

/// Run the REPL until `/quit` or EOF.
pub async fn run(widget: &ChatWidget, checker: &SymptomChecker) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = widget.transcript().subscribe();
    let mut printer = StreamPrinter::new();

    prompt();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            prompt();
            continue;
        };

        match command {
            Command::Chat(text) => chat(widget, &text, &mut events, &mut printer).await,
            Command::Analyze(symptoms) => analyze(checker, &symptoms).await,
            Command::Transcript => {
                for message in widget.transcript().snapshot().await {
                    let who = match (message.role, message.is_error) {
                        (_, true) => "error",
                        (MessageRole::User, _) => "you",
                        (MessageRole::Model, _) => "medibot",
                    };
                    println!("[{who}] {}", message.text);
                }
            }
            Command::Reset => {
                checker.reset();
                eprintln!("Symptom checker cleared.");
            }
            Command::Help => eprintln!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(name) => eprintln!("Unknown command /{name}. Try /help."),
        }
        prompt();
    }
    Ok(())
}

async fn chat(
    widget: &ChatWidget,
    text: &str,
    events: &mut broadcast::Receiver<TranscriptEvent>,
    printer: &mut StreamPrinter,
) {
    let send = widget.submit(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            event = events.recv() => match event {
                Ok(event) => emit(printer.render(&event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer lagged behind transcript");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
        }
    };

    // Events sent before the send returned
    while let Ok(event) = events.try_recv() {
        emit(printer.render(&event));
    }

    match outcome {
        Ok(SendOutcome::Completed { .. }) | Ok(SendOutcome::Failed { .. }) => println!(),
        Ok(SendOutcome::Rejected) => {}
        Err(e) => eprintln!("{e}"),
    }
}

async fn analyze(checker: &SymptomChecker, symptoms: &str) {
    eprintln!("Analyzing...");
    match checker.submit(symptoms).await {
        Ok(CheckerState::Ready(result)) => println!("\n{}\n", format_assessment(&result)),
        Ok(CheckerState::Failed(error)) => println!("\n{}\n", error.user_message),
        Ok(state) => tracing::debug!(?state, "Symptom check ended without a result"),
        Err(e) => eprintln!("{e}"),
    }
}

fn emit(text: Option<String>) {
    if let Some(text) = text {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

fn prompt() {
    eprint!("> ");
}
