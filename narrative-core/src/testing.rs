//! Testing utilities for narrative analysis.
//!
//! - `MockAnalyzer` for deterministic sessions without API calls
//! - `CountingAnalyzer` to observe how often a real analyzer is reached
//! - Assertion helpers for session phases

use crate::gateway::{AnalysisError, FailureKind, NarrativeAnalyzer};
use crate::session::{Phase, ResultSource};
use crate::schema::{Act, AnalysisResult, NarrativeBeat};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An analyzer that returns scripted outcomes in order.
///
/// Once the script runs out every call fails with an empty upstream reply.
#[derive(Default)]
pub struct MockAnalyzer {
    script: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockAnalyzer {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful analysis.
    pub fn with_result(self, result: AnalysisResult) -> Self {
        lock(&self.script).push_back(Ok(result));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: AnalysisError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Queue an outcome after construction.
    pub fn queue(&self, outcome: Result<AnalysisResult, AnalysisError>) {
        lock(&self.script).push_back(outcome);
    }

    /// The `(text, model)` pairs this mock was called with.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl NarrativeAnalyzer for MockAnalyzer {
    async fn analyze(&self, text: &str, model: &str) -> Result<AnalysisResult, AnalysisError> {
        lock(&self.calls).push((text.to_string(), model.to_string()));
        lock(&self.script)
            .pop_front()
            .unwrap_or(Err(AnalysisError::Upstream(gemini::Error::EmptyResponse)))
    }
}

/// Wraps another analyzer and counts how many times it is reached.
pub struct CountingAnalyzer<A> {
    inner: A,
    count: AtomicUsize,
}

impl<A> CountingAnalyzer<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    /// Number of analyses delegated so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: NarrativeAnalyzer> NarrativeAnalyzer for CountingAnalyzer<A> {
    async fn analyze(&self, text: &str, model: &str) -> Result<AnalysisResult, AnalysisError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.analyze(text, model).await
    }
}

/// Build a valid analysis with one beat per entry of `acts`.
///
/// Emotion rises by one per beat from -2 and tension follows the beat index.
pub fn sample_result(acts: &[Act]) -> AnalysisResult {
    let beats = acts
        .iter()
        .enumerate()
        .map(|(i, act)| NarrativeBeat {
            beat_number: i as u32 + 1,
            title: format!("Beat {}", i + 1),
            summary: format!("Something happens in beat {}.", i + 1),
            act: *act,
            emotional_value: (i as i8 - 2).clamp(-10, 10),
            tension_level: (i as u8).min(10),
            analysis_comment: String::new(),
        })
        .collect();

    AnalysisResult {
        title: "Sample".to_string(),
        logline: "A test story.".to_string(),
        overall_structure: "Built for tests.".to_string(),
        structural_defect_feedback: Vec::new(),
        beats,
    }
}

/// Assert the phase is `Idle`.
#[track_caller]
pub fn assert_idle(phase: &Phase) {
    assert!(matches!(phase, Phase::Idle), "expected Idle, got {:?}", phase);
}

/// Assert the phase is `Succeeded` from `source` and return the result.
#[track_caller]
pub fn assert_succeeded(phase: &Phase, source: ResultSource) -> &AnalysisResult {
    match phase {
        Phase::Succeeded {
            result,
            source: actual,
            ..
        } => {
            assert_eq!(*actual, source, "unexpected result source");
            result
        }
        other => panic!("expected Succeeded, got {:?}", other),
    }
}

/// Assert the phase is `Failed` with the given kind and return its message.
#[track_caller]
pub fn assert_failed(phase: &Phase, kind: FailureKind) -> &str {
    match phase {
        Phase::Failed {
            message,
            kind: actual,
        } => {
            assert_eq!(*actual, kind, "unexpected failure kind");
            message
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;

    #[tokio::test]
    async fn test_mock_analyzer_follows_script() {
        let mock = MockAnalyzer::new()
            .with_result(sample_result(&[Act::Act1]))
            .with_error(AnalysisError::Configuration("no key".to_string()));

        assert!(mock.analyze("a", "m").await.is_ok());
        assert!(matches!(
            mock.analyze("b", "m").await,
            Err(AnalysisError::Configuration(_))
        ));
        assert!(matches!(
            mock.analyze("c", "m").await,
            Err(AnalysisError::Upstream(gemini::Error::EmptyResponse))
        ));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[1].0, "b");
    }

    #[tokio::test]
    async fn test_counting_analyzer_delegates() {
        let counting = CountingAnalyzer::new(MockAnalyzer::new());
        let _ = counting.analyze("x", "m").await;
        let _ = counting.analyze("y", "m").await;

        assert_eq!(counting.count(), 2);
        assert_eq!(counting.inner().call_count(), 2);
    }

    #[test]
    fn test_sample_result_is_valid() {
        let result = sample_result(&[Act::Act1, Act::Act2, Act::Act2, Act::Act3]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(validate(&value).unwrap(), result);
    }

    #[test]
    #[should_panic(expected = "expected Failed")]
    fn test_assert_failed_panics_on_idle() {
        assert_failed(&Phase::Idle, FailureKind::Validation);
    }
}
