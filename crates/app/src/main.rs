use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stp_core::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

/// Straight-through processing of scanned banking documents.
#[derive(Parser)]
#[command(name = "stp", version, about = "Scanned banking document to APPROVED/REJECTED decision")]
struct Cli {
    /// Settings file (TOML); built-in defaults when absent.
    #[arg(long, global = true, env = "STP_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enhance, recognize and normalize a document, printing the text result
    Ocr(commands::OcrArgs),
    /// Decide on an extracted entity record (JSON)
    Decide(commands::DecideArgs),
    /// Run the text stage on a document, then decide on its entity record
    Process(commands::ProcessArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    init_tracing(&settings);

    let output = match cli.command {
        Commands::Ocr(args) => commands::ocr(&settings, args).await?,
        Commands::Decide(args) => commands::decide(&settings, args).await?,
        Commands::Process(args) => commands::process(&settings, args).await?,
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so stdout
/// stays clean JSON.
fn init_tracing(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let fmt_layer = if settings.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
