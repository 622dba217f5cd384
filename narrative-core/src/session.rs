//! AnalysisSession - the orchestrator the presentation layer drives.
//!
//! A session holds one analysis at a time and moves through
//! `Idle -> Running -> Succeeded | Failed`. A new submission from a terminal
//! phase supersedes the previous outcome; nothing is kept between attempts.

use crate::config::{find_model, EngineConfig};
use crate::gateway::{AnalysisGateway, FailureKind, NarrativeAnalyzer};
use crate::projector::{project, ChartProjection};
use crate::reference::ReferenceCache;
use crate::schema::AnalysisResult;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

/// Reasons a submission is refused before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Enter a plot or synopsis to analyze.")]
    Empty,

    #[error("Text is too long: {chars} characters (limit {limit}).")]
    TooLong { chars: usize, limit: usize },

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("An analysis is already in progress.")]
    InFlight,
}

/// Where a successful result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// The precomputed reference analysis.
    Reference,
    /// A call to the analysis model.
    Live,
}

/// The phase of a session, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// The phase of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Running,
    Succeeded {
        result: AnalysisResult,
        projection: ChartProjection,
        source: ResultSource,
    },
    Failed {
        /// Message to show the user.
        message: String,
        /// Failure class of the underlying error.
        kind: FailureKind,
    },
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Running => PhaseKind::Running,
            Phase::Succeeded { .. } => PhaseKind::Succeeded,
            Phase::Failed { .. } => PhaseKind::Failed,
        }
    }

    /// Whether the phase is an outcome of a finished attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded { .. } | Phase::Failed { .. })
    }
}

/// A narrative analysis session.
///
/// Submissions are checked against the reference cache first and only
/// reach the analyzer on a miss.
pub struct AnalysisSession<A = AnalysisGateway> {
    analyzer: A,
    cache: ReferenceCache,
    config: EngineConfig,
    phase: Phase,
    phase_tx: watch::Sender<PhaseKind>,
}

impl AnalysisSession<AnalysisGateway> {
    /// Create a session backed by Gemini and the builtin reference cache.
    pub fn new(config: EngineConfig) -> Self {
        let gateway = AnalysisGateway::new(&config);
        Self::with_analyzer(gateway, config)
    }
}

impl<A: NarrativeAnalyzer> AnalysisSession<A> {
    /// Create a session around any analyzer.
    pub fn with_analyzer(analyzer: A, config: EngineConfig) -> Self {
        let (phase_tx, _) = watch::channel(PhaseKind::Idle);
        Self {
            analyzer,
            cache: ReferenceCache::builtin(),
            config,
            phase: Phase::Idle,
            phase_tx,
        }
    }

    /// Replace the reference cache.
    pub fn with_reference_cache(mut self, cache: ReferenceCache) -> Self {
        self.cache = cache;
        self
    }

    /// Check a submission against the input guards without running it.
    pub fn check_input(&self, text: &str, model: &str) -> Result<(), InputError> {
        if matches!(self.phase, Phase::Running) {
            return Err(InputError::InFlight);
        }
        if text.trim().is_empty() {
            return Err(InputError::Empty);
        }
        let chars = text.chars().count();
        if chars > self.config.max_chars {
            return Err(InputError::TooLong {
                chars,
                limit: self.config.max_chars,
            });
        }
        if find_model(model).is_none() {
            return Err(InputError::UnsupportedModel(model.to_string()));
        }
        Ok(())
    }

    /// Run one analysis attempt and return the phase it ended in.
    ///
    /// A refused submission leaves the current phase untouched. If the
    /// returned future is dropped before it completes, the session goes back
    /// to `Idle` and accepts a fresh submission.
    pub async fn submit(&mut self, text: &str, model: &str) -> Result<&Phase, InputError> {
        self.check_input(text, model)?;

        let attempt = Uuid::new_v4();
        let span = tracing::info_span!("analysis", %attempt, model);
        self.run(text, model).instrument(span).await;

        Ok(&self.phase)
    }

    async fn run(&mut self, text: &str, model: &str) {
        let Self {
            analyzer,
            cache,
            config,
            phase,
            phase_tx,
        } = self;
        let running = RunningAttempt::start(phase, phase_tx);
        tracing::info!(chars = text.chars().count(), "analysis started");

        let outcome = match cache.lookup(text).cloned() {
            Some(result) => {
                tracing::info!("reference cache hit");
                if !config.reference_delay.is_zero() {
                    tokio::time::sleep(config.reference_delay).await;
                }
                Ok((result, ResultSource::Reference))
            }
            None => analyzer
                .analyze(text, model)
                .await
                .map(|result| (result, ResultSource::Live)),
        };

        let next = match outcome {
            Ok((result, source)) => {
                for index in result.act_regressions() {
                    tracing::warn!(
                        beat = result.beats[index].beat_number,
                        act = %result.beats[index].act,
                        "act moves back to an earlier act"
                    );
                }
                let projection = project(&result);
                tracing::info!(
                    beats = result.beat_count(),
                    transitions = projection.act_transitions.len(),
                    ?source,
                    "analysis succeeded"
                );
                Phase::Succeeded {
                    result,
                    projection,
                    source,
                }
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind(), error = %err, "analysis failed");
                Phase::Failed {
                    message: err.user_message(),
                    kind: err.kind(),
                }
            }
        };

        running.finish(next);
    }

    /// Discard a finished outcome and return to `Idle`.
    ///
    /// Does nothing while an attempt is running.
    pub fn clear(&mut self) {
        if matches!(self.phase, Phase::Running) {
            return;
        }
        publish(&mut self.phase, &self.phase_tx, Phase::Idle);
    }

    /// The current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The result of the last attempt, if it succeeded.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.phase {
            Phase::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    /// The chart projection of the current result.
    pub fn projection(&self) -> Option<&ChartProjection> {
        match &self.phase {
            Phase::Succeeded { projection, .. } => Some(projection),
            _ => None,
        }
    }

    /// The user-facing message of the last attempt, if it failed.
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Subscribe to phase changes.
    pub fn watch(&self) -> watch::Receiver<PhaseKind> {
        self.phase_tx.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }
}

fn publish(slot: &mut Phase, phase_tx: &watch::Sender<PhaseKind>, phase: Phase) {
    let kind = phase.kind();
    *slot = phase;
    phase_tx.send_replace(kind);
}

/// Holds the session in `Running` for one attempt.
///
/// Dropping it without [`RunningAttempt::finish`] returns the session to `Idle`.
struct RunningAttempt<'a> {
    phase: &'a mut Phase,
    phase_tx: &'a watch::Sender<PhaseKind>,
    finished: bool,
}

impl<'a> RunningAttempt<'a> {
    fn start(phase: &'a mut Phase, phase_tx: &'a watch::Sender<PhaseKind>) -> Self {
        publish(phase, phase_tx, Phase::Running);
        Self {
            phase,
            phase_tx,
            finished: false,
        }
    }

    fn finish(mut self, next: Phase) {
        publish(&mut *self.phase, self.phase_tx, next);
        self.finished = true;
    }
}

impl Drop for RunningAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("analysis attempt abandoned before completion");
            publish(&mut *self.phase, self.phase_tx, Phase::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AnalysisError;
    use crate::reference::SAMPLE_TEXT;
    use crate::schema::{Act, ValidationError};
    use crate::testing::{sample_result, MockAnalyzer};
    use std::time::Duration;

    const MODEL: &str = "gemini-2.5-flash";

    fn config() -> EngineConfig {
        EngineConfig::new().with_reference_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let session = AnalysisSession::with_analyzer(MockAnalyzer::new(), config());
        assert_eq!(session.phase(), &Phase::Idle);
        assert!(session.result().is_none());
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_guards_leave_phase_unchanged() {
        let analyzer = MockAnalyzer::new();
        let mut session =
            AnalysisSession::with_analyzer(analyzer, config().with_max_chars(10));

        assert_eq!(session.submit("   \n\t", MODEL).await, Err(InputError::Empty));
        assert_eq!(
            session.submit("eleven char", MODEL).await,
            Err(InputError::TooLong {
                chars: 11,
                limit: 10
            })
        );
        assert_eq!(
            session.submit("story", "gpt-4").await,
            Err(InputError::UnsupportedModel("gpt-4".to_string()))
        );
        assert_eq!(session.phase(), &Phase::Idle);
        assert_eq!(session.analyzer().call_count(), 0);
    }

    #[tokio::test]
    async fn test_limit_counts_characters_not_bytes() {
        let mut session = AnalysisSession::with_analyzer(
            MockAnalyzer::new().with_result(sample_result(&[Act::Act1])),
            config().with_max_chars(5),
        );
        // Five characters, fifteen bytes.
        let phase = session.submit("あいうえお", MODEL).await.unwrap();
        assert_eq!(phase.kind(), PhaseKind::Succeeded);
    }

    #[tokio::test]
    async fn test_live_success() {
        let analyzer = MockAnalyzer::new().with_result(sample_result(&[Act::Act1, Act::Act2]));
        let mut session = AnalysisSession::with_analyzer(analyzer, config());

        session.submit("A short story.", MODEL).await.unwrap();

        match session.phase() {
            Phase::Succeeded {
                result,
                projection,
                source,
            } => {
                assert_eq!(result.beat_count(), 2);
                assert_eq!(projection.points.len(), 2);
                assert_eq!(projection.act_transitions.len(), 1);
                assert_eq!(*source, ResultSource::Live);
            }
            other => panic!("unexpected phase: {other:?}"),
        }
        assert_eq!(session.analyzer().calls(), vec![("A short story.".to_string(), MODEL.to_string())]);
    }

    #[tokio::test]
    async fn test_reference_hit_skips_analyzer() {
        let mut session = AnalysisSession::with_analyzer(MockAnalyzer::new(), config());

        session.submit(SAMPLE_TEXT, MODEL).await.unwrap();

        assert!(matches!(
            session.phase(),
            Phase::Succeeded {
                source: ResultSource::Reference,
                ..
            }
        ));
        assert_eq!(session.result().unwrap().beat_count(), 7);
        assert_eq!(session.analyzer().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_hit_waits_for_delay() {
        let mut session = AnalysisSession::with_analyzer(
            MockAnalyzer::new(),
            EngineConfig::new().with_reference_delay(Duration::from_millis(500)),
        );

        let start = tokio::time::Instant::now();
        session.submit(SAMPLE_TEXT, MODEL).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_failure_then_success_supersedes() {
        let analyzer = MockAnalyzer::new()
            .with_error(AnalysisError::Validation(ValidationError::EmptyBeats))
            .with_result(sample_result(&[Act::Act1]));
        let mut session = AnalysisSession::with_analyzer(analyzer, config());

        session.submit("first", MODEL).await.unwrap();
        assert_eq!(session.phase().kind(), PhaseKind::Failed);
        assert!(session.error().unwrap().contains("try again"));

        session.submit("second", MODEL).await.unwrap();
        assert_eq!(session.phase().kind(), PhaseKind::Succeeded);
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_failed_records_kind() {
        let analyzer = MockAnalyzer::new().with_error(AnalysisError::Configuration(
            "API key is missing".to_string(),
        ));
        let mut session = AnalysisSession::with_analyzer(analyzer, config());

        let phase = session.submit("story", MODEL).await.unwrap();
        assert_eq!(
            phase,
            &Phase::Failed {
                message: "API key is missing".to_string(),
                kind: FailureKind::Configuration,
            }
        );
    }

    #[tokio::test]
    async fn test_clear_returns_to_idle() {
        let analyzer = MockAnalyzer::new().with_result(sample_result(&[Act::Act1]));
        let mut session = AnalysisSession::with_analyzer(analyzer, config());

        session.submit("story", MODEL).await.unwrap();
        assert!(session.phase().is_terminal());

        session.clear();
        assert_eq!(session.phase(), &Phase::Idle);
        assert!(session.projection().is_none());
    }

    #[tokio::test]
    async fn test_watch_sees_final_phase() {
        let analyzer = MockAnalyzer::new().with_result(sample_result(&[Act::Act1]));
        let mut session = AnalysisSession::with_analyzer(analyzer, config());
        let mut rx = session.watch();
        assert_eq!(*rx.borrow(), PhaseKind::Idle);

        session.submit("story", MODEL).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), PhaseKind::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_attempt_returns_to_idle() {
        let analyzer = MockAnalyzer::new().with_result(sample_result(&[Act::Act1]));
        let mut session = AnalysisSession::with_analyzer(
            analyzer,
            EngineConfig::new().with_reference_delay(Duration::from_millis(500)),
        );
        let rx = session.watch();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), session.submit(SAMPLE_TEXT, MODEL))
                .await;
        assert!(abandoned.is_err());

        assert_eq!(session.phase(), &Phase::Idle);
        assert_eq!(*rx.borrow(), PhaseKind::Idle);
        assert_eq!(session.check_input("story", MODEL), Ok(()));

        let phase = session.submit("story", MODEL).await.unwrap();
        assert_eq!(phase.kind(), PhaseKind::Succeeded);
    }
}
