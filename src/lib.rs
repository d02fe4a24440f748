//! MediBot — AI assistant integration for a telehealth site.
//!
//! A chat assistant that streams replies into a transcript, and a symptom
//! checker that returns a structured triage assessment. Both talk to one
//! process-wide [`llm::BackendClient`].

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod triage;
