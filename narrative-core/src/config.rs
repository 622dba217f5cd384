//! Engine configuration and the supported model catalogue.

use std::time::Duration;

/// Maximum input length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 30_000;

/// Environment variable holding the Gemini API key.
pub const DEFAULT_CREDENTIAL_VAR: &str = "GEMINI_API_KEY";

/// Delay observed before delivering a reference-cache hit.
pub const DEFAULT_REFERENCE_DELAY: Duration = Duration::from_millis(500);

/// Output token ceiling for a structured analysis.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 8192;

/// A selectable analysis model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Identifier sent to the API.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
}

/// The fixed set of models an analysis may run on. The first is the default.
pub const SUPPORTED_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash (recommended, fast)",
    },
    ModelInfo {
        id: "gemini-2.0-flash",
        name: "Gemini 2.0 Flash (stable)",
    },
    ModelInfo {
        id: "gemini-2.5-flash-lite-preview-02-05",
        name: "Gemini 2.5 Flash Lite (fastest)",
    },
];

/// The default model id.
pub fn default_model() -> &'static str {
    SUPPORTED_MODELS[0].id
}

/// Look up a supported model by id.
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    SUPPORTED_MODELS.iter().find(|m| m.id == id)
}

/// Configuration for an analysis engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest accepted input, counted in characters.
    pub max_chars: usize,

    /// Delay before a reference-cache hit is delivered.
    pub reference_delay: Duration,

    /// Environment variable the API key is read from.
    pub credential_var: String,

    /// Output token ceiling for the analysis request.
    pub max_output_tokens: usize,
}

impl EngineConfig {
    /// Create a config with the default limits.
    pub fn new() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            reference_delay: DEFAULT_REFERENCE_DELAY,
            credential_var: DEFAULT_CREDENTIAL_VAR.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Set the input length limit.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Set the reference-cache delivery delay.
    pub fn with_reference_delay(mut self, delay: Duration) -> Self {
        self.reference_delay = delay;
        self
    }

    /// Set the environment variable the API key is read from.
    pub fn with_credential_var(mut self, var: impl Into<String>) -> Self {
        self.credential_var = var.into();
        self
    }

    /// Set the output token ceiling.
    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = tokens;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
