mod config;
mod errors;
mod ingest;
mod models;
mod parsing;
mod pipeline;
mod ranking;
mod state;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::errors::ScreenError;
use crate::models::ranking::ScreeningResponse;
use crate::parsing::profile::synthesize_profile;
use crate::pipeline::screen_archive;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "screener", version, about = "Rank résumés in a ZIP archive against a job description")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Screen a ZIP of PDF/DOCX résumés and print the ranked candidates.
    Rank(RankArgs),
    /// Parse a single PDF and print the extracted record and its profile.
    Parse {
        path: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Debug, Args)]
struct RankArgs {
    #[arg(long)]
    archive: PathBuf,
    /// Job description text.
    #[arg(long, conflicts_with = "job_file", required_unless_present = "job_file")]
    job: Option<String>,
    /// Read the job description from a file.
    #[arg(long)]
    job_file: Option<PathBuf>,
    /// Report scores on a 0-100 scale.
    #[arg(long)]
    percent: bool,
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries only JSON.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::build(config)?;

    match cli.command {
        Command::Rank(args) => rank(&state, args).await,
        Command::Parse { path, pretty } => parse(&state, path, pretty).await,
    }
}

async fn rank(state: &AppState, args: RankArgs) -> Result<ExitCode> {
    let job_description = match (args.job, &args.job_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job description '{}'", path.display()))?,
        (None, None) => String::new(),
    };

    match screen_archive(state, &args.archive, &job_description).await {
        Ok(outcome) => {
            let data = if args.percent {
                outcome.ranked.into_iter().map(|r| r.as_percent()).collect()
            } else {
                outcome.ranked
            };
            let response = ScreeningResponse::new(outcome.batch_id, data, outcome.skipped);
            print_json(&response, args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => fail(&e, args.pretty),
    }
}

async fn parse(state: &AppState, path: PathBuf, pretty: bool) -> Result<ExitCode> {
    let file_name = display_name(&path);
    let parser = state.parser.clone();
    let extractor = state.extractor.clone();
    let record = tokio::task::spawn_blocking(move || {
        parser.parse_file(extractor.as_ref(), &path, &file_name)
    })
    .await
    .context("Parse task failed")?;

    let profile = synthesize_profile(&record.fields);
    print_json(&json!({ "record": record, "profile": profile }), pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn fail(err: &ScreenError, pretty: bool) -> Result<ExitCode> {
    print_json(&err.to_body(), pretty)?;
    Ok(ExitCode::FAILURE)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let body = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{body}")?;
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
