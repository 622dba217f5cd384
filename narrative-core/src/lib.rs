//! Narrative structure analysis engine.
//!
//! This crate provides:
//! - The beat schema that every analysis must satisfy
//! - A Gemini-backed analysis gateway with structured output
//! - A reference cache for the bundled sample plot
//! - Chart projection of the emotion and tension curves, with act markers
//! - The analysis session state machine
//!
//! # Quick Start
//!
//! ```ignore
//! use narrative_core::{project, AnalysisSession, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = AnalysisSession::new(EngineConfig::new());
//!
//!     session.submit("A pianist loses the use of one hand...", "gemini-2.5-flash").await?;
//!
//!     if let Some(result) = session.result() {
//!         println!("{}: {} beats", result.title, result.beat_count());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod projector;
pub mod reference;
pub mod render;
pub mod schema;
pub mod session;
pub mod testing;

// Re-export for convenience
pub use narrative_macros::ResponseSchema;

// Primary public API
pub use config::{default_model, find_model, EngineConfig, ModelInfo, SUPPORTED_MODELS};
pub use gateway::{AnalysisError, AnalysisGateway, FailureKind, NarrativeAnalyzer};
pub use projector::{project, ActTransition, ChartPoint, ChartProjection};
pub use reference::{ReferenceCache, SAMPLE_TEXT};
pub use render::{render_svg, ChartStyle};
pub use schema::{validate, Act, AnalysisResult, NarrativeBeat, ValidationError};
pub use session::{AnalysisSession, InputError, Phase, PhaseKind, ResultSource};
pub use testing::{CountingAnalyzer, MockAnalyzer};
