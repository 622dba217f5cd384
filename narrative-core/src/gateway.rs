//! Analysis gateway: turns arbitrary text into a validated analysis.
//!
//! The gateway builds a structured-output request (fixed instruction, the
//! beat schema, temperature zero), calls Gemini, and validates the reply
//! against the beat schema before anything reaches the session.

use crate::config::EngineConfig;
use crate::schema::{self, AnalysisResult, ValidationError};
use async_trait::async_trait;
use gemini::{Content, Gemini, Request, Response};
use thiserror::Error;
use tokio::sync::OnceCell;

const SYSTEM_PROMPT: &str = include_str!("prompts/analysis_system.txt");

/// Directive placed before the user's text.
const CONTENT_DIRECTIVE: &str = "Analyze the following story:";

const GENERIC_FAILURE: &str =
    "An error occurred during analysis. Wait a moment and try again, or shorten the text.";

/// Errors from an analysis attempt.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Configuration(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] gemini::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// The class of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Upstream,
    Validation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Upstream => "upstream",
            FailureKind::Validation => "validation",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnalysisError {
    /// The failure class.
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::Configuration(_) => FailureKind::Configuration,
            AnalysisError::Upstream(_) => FailureKind::Upstream,
            AnalysisError::Validation(_) => FailureKind::Validation,
        }
    }

    /// The message shown to the user.
    ///
    /// Configuration problems are shown verbatim. Upstream and validation
    /// failures share one generic message and never expose the raw reply.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Configuration(message) => message.clone(),
            AnalysisError::Upstream(_) | AnalysisError::Validation(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Anything that can produce an analysis for a text.
#[async_trait]
pub trait NarrativeAnalyzer: Send + Sync {
    /// Analyze `text` with the model `model`.
    async fn analyze(&self, text: &str, model: &str) -> Result<AnalysisResult, AnalysisError>;
}

/// The Gemini-backed analyzer.
///
/// The API key is resolved on the first analysis attempt, not at construction.
pub struct AnalysisGateway {
    credential_var: String,
    max_output_tokens: usize,
    client: OnceCell<Gemini>,
}

impl AnalysisGateway {
    /// Create a gateway that reads its key from the configured environment variable.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            credential_var: config.credential_var.clone(),
            max_output_tokens: config.max_output_tokens,
            client: OnceCell::new(),
        }
    }

    /// Create a gateway around an already configured client.
    pub fn with_client(client: Gemini, config: &EngineConfig) -> Self {
        Self {
            credential_var: config.credential_var.clone(),
            max_output_tokens: config.max_output_tokens,
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<&Gemini, AnalysisError> {
        self.client
            .get_or_try_init(|| async {
                Gemini::from_env_var(&self.credential_var).map_err(|e| match e {
                    gemini::Error::NoApiKey => AnalysisError::Configuration(format!(
                        "API key is missing: set the {} environment variable.",
                        self.credential_var
                    )),
                    other => AnalysisError::Configuration(other.to_string()),
                })
            })
            .await
    }

    /// Build the structured-output request for `text`.
    pub fn build_request(&self, text: &str, model: &str) -> Request {
        Request::new(vec![Content::user(format!("{CONTENT_DIRECTIVE}\n\n{text}"))])
            .with_model(model)
            .with_system(SYSTEM_PROMPT)
            .with_schema_of::<AnalysisResult>()
            .with_max_output_tokens(self.max_output_tokens)
            .with_temperature(0.0)
    }

    /// Validate a reply into an analysis.
    pub fn parse_reply(response: &Response) -> Result<AnalysisResult, AnalysisError> {
        let text = response.require_text()?;
        if response.finish_reason != gemini::FinishReason::Stop {
            tracing::warn!(finish_reason = ?response.finish_reason, "reply did not finish normally");
        }
        let result = schema::validate_str(extract_json(text))?;
        Ok(result)
    }
}

#[async_trait]
impl NarrativeAnalyzer for AnalysisGateway {
    async fn analyze(&self, text: &str, model: &str) -> Result<AnalysisResult, AnalysisError> {
        let client = self.client().await?;
        let request = self.build_request(text, model);
        tracing::debug!(model, chars = text.chars().count(), "sending analysis request");

        let response = client.generate(request).await?;
        tracing::debug!(
            model = %response.model,
            reply_chars = response.text.len(),
            output_tokens = response.usage.output_tokens,
            "analysis reply received"
        );

        Self::parse_reply(&response)
    }
}

/// Extract JSON from a reply that might be wrapped in a Markdown code block.
///
/// Only a fence that opens the reply is unwrapped; backticks inside the
/// JSON itself are left alone.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    let Some(fenced) = text.strip_prefix("```") else {
        return text;
    };
    let body = fenced.strip_prefix("json").unwrap_or(fenced);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}
