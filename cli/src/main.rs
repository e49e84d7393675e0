//! bidsweep: scheduled processing sweeps over a BIDS dataset.
//!
//! Usage:
//!   bidsweep run --config sweep.toml [--pipeline NAME] [--dry-run]
//!   bidsweep validate pipelines/
//!   bidsweep verify-trace traces/mriqc_<sweep id>.json

mod config;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bidsweep_contracts::{
    decision::SweepSummary,
    error::{SweepError, SweepResult},
    settings::SweepId,
};
use bidsweep_core::Sweep;
use bidsweep_ref_local::{JsonFileRegistry, JsonJobBroker, LocalObjectStore};
use bidsweep_rules::RuleEngine;
use bidsweep_trace::{render_csv, render_html, InMemoryDecisionLog, TraceLog};

use crate::config::RunConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Decide which subjects need processing and submit their jobs.
#[derive(Parser)]
#[command(
    name = "bidsweep",
    about = "Scheduled processing sweeps over a BIDS dataset",
    long_about = "Evaluates every subject/session against a pipeline's input requirements,\n\
                  submits eligible subjects once, and writes a hash-chained decision trace."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sweep and write its trace (JSON, CSV and HTML).
    Run {
        /// Sweep settings file (TOML).
        #[arg(long, short)]
        config: PathBuf,
        /// Override the pipeline named in the settings file.
        #[arg(long)]
        pipeline: Option<String>,
        /// Evaluate and trace without uploading or submitting anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate every pipeline document in a directory.
    Validate {
        dir: PathBuf,
    },
    /// Check the hash chain of an exported trace.
    VerifyTrace {
        file: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // RUST_LOG=debug for per-rule evaluation detail.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { config, pipeline, dry_run } => run(&config, pipeline, dry_run),
        Command::Validate { dir } => validate(&dir),
        Command::VerifyTrace { file } => verify_trace(&file),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("bidsweep: {e}");
            ExitCode::FAILURE
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run(config_path: &Path, pipeline: Option<String>, dry_run: bool) -> SweepResult<bool> {
    let mut config = RunConfig::from_file(config_path)?;
    if let Some(pipeline) = pipeline {
        config.sweep.pipeline = pipeline;
    }
    config.sweep.dry_run |= dry_run;

    let engine = RuleEngine::from_dir(&config.pipelines_dir)?;
    let sweep_id = SweepId::new();
    let trace = InMemoryDecisionLog::new(sweep_id.to_string());
    let pipeline = config.sweep.pipeline.clone();

    let sweep = Sweep::new(
        Box::new(LocalObjectStore::new(&config.store_root)),
        Box::new(JsonFileRegistry::open(&config.registry_snapshot)?),
        Box::new(JsonJobBroker::open(&config.broker_snapshot)?),
        Box::new(engine),
        Box::new(trace.clone()),
        config.sweep,
    );
    let outcome = sweep.run(&sweep_id);

    // Rows recorded before a fatal error still explain those subjects.
    let stem = format!("{pipeline}_{sweep_id}");
    write_trace(&trace, &config.trace_dir, &stem, &pipeline)?;

    let summary = outcome?;
    print_summary(&pipeline, &sweep_id, &summary);
    Ok(true)
}

fn write_trace(trace: &InMemoryDecisionLog, dir: &Path, stem: &str, pipeline: &str) -> SweepResult<()> {
    let to_error = |path: &Path, e: std::io::Error| SweepError::TraceWriteFailed {
        reason: format!("failed to write '{}': {e}", path.display()),
    };
    std::fs::create_dir_all(dir).map_err(|e| to_error(dir, e))?;

    let log = trace.export_log()?;
    let rows = log.rows();
    let outputs = [
        ("json", log.to_json_pretty()?.into_bytes()),
        ("csv", render_csv(&rows)?),
        ("html", render_html(&format!("{pipeline} sweep {}", log.sweep_id), &rows).into_bytes()),
    ];
    for (extension, body) in outputs {
        let path = dir.join(format!("{stem}.{extension}"));
        std::fs::write(&path, body).map_err(|e| to_error(&path, e))?;
        info!(path = %path.display(), "trace written");
    }
    Ok(())
}

fn print_summary(pipeline: &str, sweep_id: &SweepId, summary: &SweepSummary) {
    println!("Sweep {sweep_id} ({pipeline})");
    println!("  evaluated:    {}", summary.evaluated);
    println!("  submitted:    {}", summary.submitted);
    println!("  would submit: {}", summary.would_submit);
    println!("  skipped:      {}", summary.skipped);
}

fn validate(dir: &Path) -> SweepResult<bool> {
    let engine = RuleEngine::from_dir(dir)?;
    for name in engine.pipeline_names() {
        println!("ok  {name}");
    }
    Ok(true)
}

fn verify_trace(file: &Path) -> SweepResult<bool> {
    let text = std::fs::read_to_string(file).map_err(|e| SweepError::ConfigError {
        reason: format!("failed to read trace '{}': {e}", file.display()),
    })?;
    let log = TraceLog::from_json_str(&text)?;

    if log.verify() {
        println!("ok  sweep {} ({} rows, terminal hash {})", log.sweep_id, log.events.len(), log.terminal_hash);
        Ok(true)
    } else {
        error!(file = %file.display(), "trace chain does not verify");
        println!("TAMPERED  sweep {}", log.sweep_id);
        Ok(false)
    }
}
