//! Command-line arguments.

use clap::{Parser, Subcommand};
use narrative_core::config::{DEFAULT_CREDENTIAL_VAR, DEFAULT_MAX_CHARS};
use std::path::PathBuf;

/// Narrative structure analyzer: beats, emotion and tension curves, act structure
#[derive(Parser)]
#[command(name = "narrative", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a plot or synopsis
    Analyze(AnalyzeArgs),

    /// List the supported analysis models
    Models,

    /// Print the bundled sample plot
    Sample,
}

#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// File containing the text (reads stdin when omitted)
    #[arg(conflicts_with = "sample")]
    pub file: Option<PathBuf>,

    /// Analyze the bundled sample plot
    #[arg(long)]
    pub sample: bool,

    /// Model to run the analysis on
    #[arg(long, env = "NARRATIVE_MODEL", default_value = narrative_core::default_model())]
    pub model: String,

    /// Print the result and chart projection as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the arc chart as SVG to this path
    #[arg(long)]
    pub svg: Option<PathBuf>,

    /// Longest accepted input, in characters
    #[arg(long, env = "NARRATIVE_MAX_CHARS", default_value_t = DEFAULT_MAX_CHARS)]
    pub max_chars: usize,

    /// Environment variable holding the Gemini API key
    #[arg(long, env = "NARRATIVE_CREDENTIAL_VAR", default_value = DEFAULT_CREDENTIAL_VAR)]
    pub credential_var: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::try_parse_from(["narrative", "analyze", "--sample"]).unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert!(args.sample);
                assert!(args.file.is_none());
                assert_eq!(args.model, "gemini-2.5-flash");
                assert_eq!(args.max_chars, 30_000);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_file_conflicts_with_sample() {
        assert!(Cli::try_parse_from(["narrative", "analyze", "plot.txt", "--sample"]).is_err());
    }
}
