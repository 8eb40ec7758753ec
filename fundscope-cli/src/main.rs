//! FundScope CLI — one profile in, one JSON recommendation line out.
//!
//! Stdout carries human-readable progress lines followed by exactly one
//! JSON object `{"recommendation": "..."}` as the last line; callers parse
//! only the final well-formed JSON line. Logs and the load spinner go to
//! stderr so they never disturb that contract.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use fundscope_core::{
    model, ExecutionTarget, GenerationRequest, ModelConfig, ModelSession, Recommendation,
};

/// Exit status for the argument-absent path: a user error, kept
/// distinguishable from both success and loader/generation crashes.
const MISSING_INPUT_EXIT: i32 = 2;

#[derive(Parser)]
#[command(
    name = "fundscope",
    about = "Generate a funding recommendation from a company profile",
    version
)]
struct Cli {
    /// Company or user profile text to base the recommendation on.
    profile: Option<String>,

    /// Model ID override (HuggingFace repo).
    #[arg(long)]
    model: Option<String>,

    /// Repo revision/branch override.
    #[arg(long)]
    revision: Option<String>,

    /// Use the public small-model preset: raw profile as the prompt,
    /// no access credential needed.
    #[arg(long)]
    passthrough: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(profile) = cli.profile else {
        let code = report_missing_input(&mut std::io::stdout().lock())?;
        std::process::exit(code);
    };

    let mut config = if cli.passthrough {
        ModelConfig::public_small()
    } else {
        ModelConfig::default()
    };
    if let Some(model_id) = cli.model {
        config.model_id = model_id;
    }
    if let Some(revision) = cli.revision {
        config.revision = Some(revision);
    }
    tracing::debug!(model = %config.model_id, variant = ?config.variant, "resolved model config");

    let target = ExecutionTarget::detect();
    println!("Using device: {target}");

    println!("Loading tokenizer...");
    let tokenizer = model::load_tokenizer(&config)?;

    println!("Loading model...");
    let spinner = load_spinner(&config.model_id);
    let loaded = model::load_model(&config, &target);
    spinner.finish_and_clear();
    let mut session = ModelSession::new(loaded?, tokenizer, target);
    println!("Model loaded successfully");

    println!("Received input: {profile}");
    let request = GenerationRequest::new(profile, config.variant);
    let result = session.recommend(&request)?;

    emit_recommendation(&mut std::io::stdout().lock(), result.recommendation)?;

    Ok(())
}

/// Argument-absent diagnostic: one plain stdout line, no JSON, and the
/// exit status to terminate with. Runs before any model loading.
fn report_missing_input(out: &mut impl Write) -> Result<i32> {
    writeln!(out, "No user info provided")?;
    Ok(MISSING_INPUT_EXIT)
}

/// Write the single JSON result line — the last thing on stdout.
fn emit_recommendation(out: &mut impl Write, recommendation: String) -> Result<()> {
    let json = serde_json::to_string(&Recommendation { recommendation })?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Stderr spinner while weights download and map; first runs of the 7B
/// chat model pull ~13GB.
fn load_spinner(model_id: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Fetching and mapping weights for {model_id}..."));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
