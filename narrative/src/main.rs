//! Narrative - command-line narrative structure analyzer.
//!
//! Usage:
//!   narrative analyze plot.txt            Analyze a file
//!   narrative analyze --sample --svg a.svg  Analyze the sample and write the chart
//!   cat plot.txt | narrative analyze --json
//!   narrative models                      List supported models
//!   narrative sample                      Print the sample plot

mod cli;
mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use narrative_core::{
    render_svg, AnalysisSession, ChartStyle, EngineConfig, Phase, PhaseKind, SAMPLE_TEXT,
    SUPPORTED_MODELS,
};
use std::io::Write;
use tokio::io::AsyncReadExt;

use cli::{AnalyzeArgs, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("narrative=info".parse()?)
                .add_directive("narrative_core=info".parse()?),
        )
        .init();

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Models => {
            for (i, model) in SUPPORTED_MODELS.iter().enumerate() {
                let marker = if i == 0 { " (default)" } else { "" };
                println!("{:<40} {}{}", model.id, model.name, marker);
            }
            Ok(())
        }
        Commands::Sample => {
            write_sample(&mut std::io::stdout().lock())?;
            Ok(())
        }
    }
}

/// Write the sample exactly as cached, so piping it back into `analyze` hits the cache.
fn write_sample(out: &mut impl Write) -> std::io::Result<()> {
    out.write_all(SAMPLE_TEXT.as_bytes())?;
    out.flush()
}

async fn read_input(args: &AnalyzeArgs) -> Result<String> {
    if args.sample {
        return Ok(SAMPLE_TEXT.to_string());
    }
    match &args.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let text = read_input(&args).await?;

    let config = EngineConfig::new()
        .with_max_chars(args.max_chars)
        .with_credential_var(&args.credential_var);
    eprintln!("{}", report::char_counter(&text, config.max_chars));

    let mut session = AnalysisSession::new(config);

    let mut phases = session.watch();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            if *phases.borrow_and_update() == PhaseKind::Running {
                tracing::info!("Processing narrative data...");
            }
        }
    });

    let outcome = session.submit(&text, &args.model).await;
    progress.abort();

    let phase = match outcome {
        Ok(phase) => phase,
        Err(err) => bail!(err),
    };

    match phase {
        Phase::Succeeded {
            result,
            projection,
            source,
        } => {
            if let Some(path) = &args.svg {
                let svg = render_svg(projection, &ChartStyle::default());
                tokio::fs::write(path, svg)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "chart written");
            }

            if args.json {
                let export = serde_json::json!({
                    "result": result,
                    "projection": projection,
                    "source": source,
                });
                println!("{}", serde_json::to_string_pretty(&export)?);
            } else {
                print!("{}", report::format_report(result, *source));
            }
            Ok(())
        }
        Phase::Failed { message, .. } => bail!("{message}"),
        Phase::Idle | Phase::Running => bail!("analysis did not finish"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrative_core::testing::{assert_succeeded, MockAnalyzer};
    use narrative_core::ResultSource;
    use std::time::Duration;

    #[test]
    fn test_sample_output_is_verbatim() {
        let mut out = Vec::new();
        write_sample(&mut out).unwrap();
        assert_eq!(out, SAMPLE_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_printed_sample_hits_reference_cache() {
        let mut out = Vec::new();
        write_sample(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let config = EngineConfig::new().with_reference_delay(Duration::ZERO);
        let mut session = AnalysisSession::with_analyzer(MockAnalyzer::new(), config);
        let phase = session.submit(&text, narrative_core::default_model()).await.unwrap();

        assert_succeeded(phase, ResultSource::Reference);
        assert_eq!(session.analyzer().call_count(), 0);
    }
}
