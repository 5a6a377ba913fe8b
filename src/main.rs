//! Autotranslate - Batch Locale and Catalog Translation
//!
//! Command line entry point: scans locale files, fills in missing
//! translations and translates catalog entities.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autotranslate::catalog::EnsureOutcome;
use autotranslate::cli::{Args, CatalogAction, Commands};
use autotranslate::config::Config;
use autotranslate::pipeline::LanguageOutcome;
use autotranslate::translate::{check_completion_availability, language_name};
use autotranslate::workflow::Workflow;

const DEFAULT_CONFIG: &str = "autotranslate.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new(DEFAULT_CONFIG).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
                Config::from_file(DEFAULT_CONFIG)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Check => {
            check_completion_availability(&config.completion).await?;
            println!("Completion endpoint {} is reachable", config.completion.endpoint);
        }
        Commands::Scan { lang } => {
            let workflow = Workflow::new(config).await?;
            let report = workflow.scan_report(lang.as_deref()).await?;

            println!("\n{:<10} {:<20} {:<10}", "Code", "Language", "Missing");
            println!("{}", "-".repeat(40));
            for (language, missing) in report {
                println!("{:<10} {:<20} {:<10}", language, language_name(&language), missing);
            }
        }
        Commands::Sync { langs, dry_run } => {
            let workflow = Workflow::new(config).await?;
            let spinner = spinner("Translating missing keys...")?;

            if dry_run {
                let batches = workflow.preview(&langs).await?;
                spinner.finish_and_clear();
                if batches.is_empty() {
                    println!("Nothing to translate.");
                }
                for batch in batches {
                    println!("\n[{}] {} key(s), {} fallback(s)", batch.language, batch.translations.len(), batch.fallbacks.len());
                    for (key, text) in &batch.translations {
                        let marker = if batch.fallbacks.contains(key) { "*" } else { " " };
                        println!("{} {:<40} {}", marker, key, text);
                    }
                }
            } else {
                let report = workflow.sync(&langs).await?;
                spinner.finish_and_clear();

                println!("\nRun {} ({} call(s))", report.run_id, report.calls_made);
                for (language, outcome) in &report.outcomes {
                    let status = match outcome {
                        LanguageOutcome::Complete => "complete".to_string(),
                        LanguageOutcome::Patched { keys, fallbacks } => {
                            format!("patched {} key(s), {} fallback(s)", keys, fallbacks)
                        }
                        LanguageOutcome::Failed { error } => format!("failed: {}", error),
                        LanguageOutcome::Skipped { reason } => format!("skipped: {}", reason),
                    };
                    println!("{:<10} {}", language, status);
                }
                if !report.all_succeeded() {
                    anyhow::bail!("Translation failed for: {}", report.failed_languages().join(", "));
                }
            }
        }
        Commands::Watch => {
            let workflow = Workflow::new(config).await?;
            workflow.watch().await?;
        }
        Commands::Catalog { action } => match action {
            CatalogAction::Translate { lang, limit } => {
                let workflow = Workflow::new(config).await?;
                let spinner = spinner("Translating catalog...")?;
                let summary = workflow.translate_catalog(&lang, limit).await?;
                spinner.finish_and_clear();

                println!("\nCatalog batch for {} ({})", language_name(&lang), lang);
                println!("Entities missing fields: {}", summary.considered);
                println!("Entities translated:     {}", summary.entities_translated);
                println!("Fields written:          {}", summary.fields_written);
                println!("Requests made:           {}", summary.calls_made);
                for (id, error) in &summary.failures {
                    println!("Failed {}: {}", id, error);
                }
            }
            CatalogAction::Ensure { lang, ids } => {
                let workflow = Workflow::new(config).await?;
                let spinner = spinner("Ensuring catalog translations...")?;
                let (summary, outcomes) = workflow.ensure_products(&lang, &ids).await?;
                spinner.finish_and_clear();

                println!(
                    "\nStarted {}, already translated {}, in flight {}, deferred {}",
                    summary.scheduled, summary.already_translated, summary.in_flight, summary.deferred
                );
                for outcome in outcomes {
                    match outcome {
                        EnsureOutcome::Translated { id, fields, .. } => println!("{:<20} translated {} field(s)", id, fields),
                        EnsureOutcome::AlreadyTranslated { id, .. } => println!("{:<20} already translated", id),
                        EnsureOutcome::Failed { id, error, .. } => println!("{:<20} failed: {}", id, error),
                    }
                }
            }
        },
    }

    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".autotranslate").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "autotranslate.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("autotranslate.log").display()
    );

    Ok(())
}
