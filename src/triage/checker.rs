//! Symptom checker controller — the caller-side state machine around
//! [`SymptomAnalyzer`].
//!
//! ```text
//! Idle ──submit──▶ Loading ──▶ Ready(result)
//!                          └─▶ Failed(classified)
//! any ──reset──▶ Idle
//! ```

use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{ClassifiedError, SubmitError, classify};
use crate::llm::BackendClient;

use super::analyzer::SymptomAnalyzer;
use super::model::SymptomAnalysisResult;

/// What the symptom checker is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckerState {
    #[default]
    Idle,
    Loading,
    Ready(SymptomAnalysisResult),
    /// Fallback shown instead of a result.
    Failed(ClassifiedError),
}

impl CheckerState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: CheckerState,
    /// Bumped on every submit and reset so a stale result is dropped.
    generation: u64,
}

/// One mounted symptom checker.
#[derive(Debug)]
pub struct SymptomChecker {
    analyzer: SymptomAnalyzer,
    client: BackendClient,
    inner: Mutex<Inner>,
}

impl SymptomChecker {
    pub fn new(analyzer: SymptomAnalyzer, client: BackendClient) -> Self {
        Self {
            analyzer,
            client,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> CheckerState {
        self.lock().state.clone()
    }

    /// Run one analysis and return the state it settled in.
    ///
    /// Empty input and a submit while loading are rejected without touching
    /// the current state. Analysis failures are not errors here; they become
    /// [`CheckerState::Failed`].
    pub async fn submit(&self, symptoms: &str) -> Result<CheckerState, SubmitError> {
        if symptoms.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }

        let generation = {
            let mut inner = self.lock();
            if inner.state.is_loading() {
                debug!("Symptom check rejected, analysis in flight");
                return Err(SubmitError::Busy);
            }
            inner.state = CheckerState::Loading;
            inner.generation += 1;
            inner.generation
        };

        let next = match self.analyzer.analyze(&self.client, symptoms).await {
            Ok(result) => CheckerState::Ready(result),
            Err(e) => CheckerState::Failed(classify(&e)),
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            info!("Symptom checker reset during analysis, result discarded");
            return Ok(inner.state.clone());
        }
        inner.state = next.clone();
        Ok(next)
    }

    /// Back to [`CheckerState::Idle`], discarding any in-flight result.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CheckerState::Idle;
        inner.generation += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // State is plain data; a poisoned lock still holds a usable value.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
