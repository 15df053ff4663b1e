//! statsdb - main entry point

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use statsdb_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use statsdb_ingest::{cleanup, loader, orchestrator, Cli, IngestConfig, IngestError, IngestionSummary};
use std::io::{self, IsTerminal};
use std::process;
use tracing::{error, info};

const EXIT_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[tokio::main]
async fn main() {
    // .env values only fill in variables that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("statsdb")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let guard = init_logging(&log_config).ok();

    let code = execute(cli).await;

    drop(guard);
    process::exit(code);
}

async fn execute(cli: Cli) -> i32 {
    let config = cli.into_config();

    let summary = match ingest(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            report_error(&e);
            return match e.downcast_ref::<IngestError>() {
                Some(IngestError::Config(_)) => EXIT_CONFIG,
                _ => EXIT_FAILED,
            };
        },
    };

    // The summary covers what was committed, whatever cleanup does next
    print_summary(&summary);
    if !summary.is_success() {
        return EXIT_FAILED;
    }

    if config.cleanup {
        if let Err(e) = clean_up(&config, &summary).context("Cleanup failed") {
            report_error(&e);
            return EXIT_FAILED;
        }
    }

    0
}

async fn ingest(config: &IngestConfig) -> anyhow::Result<IngestionSummary> {
    config.validate()?;

    let pool = loader::connect(&config.database).await?;
    let show_progress = io::stderr().is_terminal();
    let summary = orchestrator::run(&config.directory, &pool, &config.ingest_options(show_progress)).await?;

    pool.close().await;
    Ok(summary)
}

fn report_error(e: &anyhow::Error) {
    error!(error = %e, "Command failed");
    eprintln!("{} {:#}", "Error:".red().bold(), e);
}

fn clean_up(config: &IngestConfig, summary: &IngestionSummary) -> anyhow::Result<()> {
    let files = &summary.committed_sources;
    if files.is_empty() {
        return Ok(());
    }

    let trash = cleanup::trash_dir(&config.directory, chrono::Local::now().date_naive());

    if !config.assume_yes {
        let prompt = format!("Move {} files to {}?", files.len(), trash.display());
        let confirmed = cleanup::confirm(&prompt, &mut io::stdin().lock(), &mut io::stdout())?;
        if !confirmed {
            println!("Cleanup cancelled.");
            return Ok(());
        }
    }

    let report = cleanup::move_to_trash(files, &trash)?;
    info!(moved = report.moved.len(), failed = report.failed.len(), "Cleanup finished");

    println!(
        "{} Moved {} files to {}",
        "✓".green(),
        report.moved.len(),
        trash.display()
    );
    for (file, e) in &report.failed {
        println!("{} {}: {}", "✗".red(), file.display(), e);
    }
    Ok(())
}

fn print_summary(summary: &IngestionSummary) {
    println!();
    println!("{}", "Ingestion summary".bold());
    println!("  files found:   {}", summary.total);
    println!("  processed:     {}", summary.processed.to_string().green());
    println!("  skipped:       {}", summary.skipped.to_string().yellow());
    for (kind, count) in &summary.skipped_by_kind {
        println!("    {kind}: {count}");
    }
    println!("  rows inserted: {}", summary.rows_inserted);
    if summary.duplicates > 0 {
        println!("  duplicates:    {}", summary.duplicates);
    }
    println!("  batches:       {}", summary.batches_committed);
    println!("  elapsed:       {:.2?}", summary.duration);

    for failure in &summary.failed_batches {
        println!(
            "{} batch {} failed: {}",
            "✗".red(),
            failure.index,
            failure.error
        );
    }
}
