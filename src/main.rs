//! CLI entry point for the wheelfetch tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use wheelfetch_core::config::{Settings, default_settings_path};
use wheelfetch_core::failure::describe;
use wheelfetch_core::job::{ChannelSink, ItemOutcome, JobEngine, JobReport};

mod cli;
mod exit;
mod progress;

use cli::Args;
use exit::{ProcessExit, determine_exit_outcome};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Args holds the proxy password, so only non-secret fields are logged.
    debug!(verbose = args.verbose, quiet = args.quiet, strategy = ?args.strategy, "CLI arguments parsed");

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("error: {error:#}");
            ProcessExit::SetupFailure.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let settings_path = args.settings.clone().or_else(default_settings_path);
    let saved = match &settings_path {
        Some(path) => Settings::load(path)?.unwrap_or_default(),
        None => Settings::default(),
    };
    let settings = saved.overlay(args.to_settings());

    let config = settings
        .to_builder()?
        .build()
        .context("invalid job configuration")?;

    if args.save_settings {
        let path = settings_path
            .context("no settings location; pass --settings FILE to choose one")?;
        settings.save(&path)?;
    }

    let engine = JobEngine::new(config)?;

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after in-flight items");
            cancel.cancel();
        }
    });

    let use_bar = !args.quiet && io::stderr().is_terminal();
    let (sink, events) = ChannelSink::new();
    let progress = progress::spawn_progress_ui(use_bar, events);

    let report = engine.run(Arc::new(sink)).await;
    // The engine dropped its sink; the consumer drains and exits.
    let _ = progress.await;
    let report = report?;

    if !args.quiet {
        print_report(&report);
    }
    Ok(determine_exit_outcome(&report.summary()))
}

fn print_report(report: &JobReport) {
    let summary = report.summary();
    println!("{summary} (strategy: {})", report.strategy());
    if report.downgraded() {
        println!("note: index client unavailable; used the package manager instead");
    }
    for failure in report.failures() {
        println!("  FAILED {} [{}]: {}", failure.package, failure.target, failure.outcome);
        if let ItemOutcome::Failed { kind, .. } = &failure.outcome {
            let descriptor = describe(*kind);
            println!("    What: {}", descriptor.what);
            println!("    Why:  {}", descriptor.why);
            println!("    Fix:  {}", descriptor.fix);
        }
    }
}
