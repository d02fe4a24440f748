//! Symptom triage: one-shot structured analysis and the checker around it.

pub mod analyzer;
pub mod checker;
pub mod model;

pub use analyzer::{AnalyzerConfig, SymptomAnalyzer, parse_analysis_response};
pub use checker::{CheckerState, SymptomChecker};
pub use model::{SymptomAnalysisResult, Urgency, response_schema};
