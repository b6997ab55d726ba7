//! bannerlens - Banner image text analysis
//!
//! Command line front end: analyze a banner image from a file or URL and
//! print the recognized text and suggestions, optionally as JSON.

use anyhow::{Context, Result};
use bannerlens::engine::TesseractCli;
use bannerlens::pipeline::{AnalyzeOptions, Analyzer, ImageSource};
use bannerlens::{config, AnalysisSettings};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// bannerlens - Banner image text analysis
#[derive(Parser, Debug)]
#[command(name = "bannerlens")]
#[command(about = "Extract text, alt-text and call-to-action suggestions from banner images")]
struct Args {
    /// Image file path or http(s) URL
    input: String,

    /// Settings file (TOML); defaults are used when absent
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Analyze even when the text-likelihood precheck would skip
    #[arg(short, long)]
    force: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// OCR language passed to tesseract
    #[arg(short, long, default_value = "eng")]
    lang: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = match &args.settings {
        Some(path) => config::load_settings(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => AnalysisSettings::default(),
    };

    let source = if args.input.starts_with("http://") || args.input.starts_with("https://") {
        ImageSource::Url(args.input.clone())
    } else {
        ImageSource::Path(PathBuf::from(&args.input))
    };

    let engine = TesseractCli::locate(&args.lang)?;
    let mut analyzer = Analyzer::new(engine);

    let opts = AnalyzeOptions {
        force: args.force,
        ..Default::default()
    };
    let result = analyzer
        .analyze(&source, &settings, &opts)
        .await
        .with_context(|| format!("analyzing {}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let Some(reason) = result.skipped {
        info!(?reason, likelihood = result.text_likelihood, "analysis skipped");
        println!("(no text: image judged unlikely to contain readable text)");
        return Ok(());
    }

    if result.display_text.is_empty() {
        println!("(no text recognized)");
    } else {
        println!("{}", result.display_text);
    }

    if !result.alt_suggestions.is_empty() {
        println!("\nAlt text:");
        for alt in &result.alt_suggestions {
            println!("  {alt}");
        }
    }
    if !result.cta_suggestions.is_empty() {
        println!("\nCall to action:");
        for cta in &result.cta_suggestions {
            println!("  {cta}");
        }
    }
    if !result.name_suggestions.is_empty() {
        println!("\nFilename ideas:");
        for name in &result.name_suggestions {
            println!("  {name}");
        }
    }

    Ok(())
}
