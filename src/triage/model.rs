//! Symptom analysis result types and the response schema sent to the backend.

use serde::{Deserialize, Serialize};

/// Triage severity. Deserialization is an exact, case-sensitive match on the
/// four literal values; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [Self::Low, Self::Medium, Self::High, Self::Emergency];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Emergency => "EMERGENCY",
        }
    }

    /// HIGH or EMERGENCY.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Emergency)
    }

    /// The visitor should contact emergency services rather than book.
    pub fn requires_emergency_care(&self) -> bool {
        matches!(self, Self::Emergency)
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated triage assessment.
///
/// Only produced after the payload parsed and every required field was
/// present with the right type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomAnalysisResult {
    /// Brief, empathetic summary of the reported symptoms.
    pub assessment: String,
    pub urgency: Urgency,
    /// Most relevant service, e.g. "Primary Care" or "Mental Health".
    pub recommended_service: String,
    /// Mandatory medical disclaimer.
    pub disclaimer: String,
}

/// Field names the backend must return.
pub const REQUIRED_FIELDS: [&str; 4] = ["assessment", "urgency", "recommendedService", "disclaimer"];

/// Response-shape declaration sent with every analysis request.
///
/// `urgency` is documented, not enforced, as the four-value enumeration; the
/// analyzer validates it after parsing.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "assessment": {
                "type": "STRING",
                "description": "A brief, empathetic summary of the reported symptoms."
            },
            "urgency": {
                "type": "STRING",
                "description": "One of: LOW, MEDIUM, HIGH, EMERGENCY"
            },
            "recommendedService": {
                "type": "STRING",
                "description": "The most relevant service from: Primary Care, Urgent Care, Mental Health, Specialist"
            },
            "disclaimer": {
                "type": "STRING",
                "description": "A mandatory medical disclaimer."
            }
        },
        "required": REQUIRED_FIELDS,
    })
}
