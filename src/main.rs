mod collectors;
mod config;
mod dedup;
mod error;
mod fetch;
mod models;
mod relevance;
mod report;
mod store;
mod text;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::collectors::runner::{Interrupt, Orchestrator};
use crate::collectors::{SOURCE_NAMES, build_collectors};
use crate::config::{Cli, Command, LogFormat, SearchConfig, TEST_MODE_MAX_JOBS};
use crate::models::run::RunOutcome;
use crate::store::{JobStore, PgJobStore};

const EXIT_STORE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobscout=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: &Cli) -> anyhow::Result<ExitCode> {
    match cli.resolved_command() {
        Command::Sources => {
            for name in SOURCE_NAMES {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let Some(store) = connect(cli).await? else {
                return Ok(ExitCode::from(EXIT_CONFIG));
            };
            let stats = store.stats().await.context("Failed to read store statistics")?;
            print!("{}", report::render_stats(&stats));
            Ok(ExitCode::SUCCESS)
        }
        Command::SetStatus { link, status } => {
            let Some(store) = connect(cli).await? else {
                return Ok(ExitCode::from(EXIT_CONFIG));
            };
            if store.update_status(&link, &status).await? {
                tracing::info!(link = %link, status = %status, "Status updated");
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::error!(link = %link, "No stored job has this link");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Run {
            sources,
            test,
            summary_dir,
        } => run_pipeline(cli, &sources, test, &summary_dir).await,
    }
}

/// Connect (and migrate) the store. `None` means no database URL was given.
async fn connect(cli: &Cli) -> anyhow::Result<Option<PgJobStore>> {
    let Some(url) = cli.database_url.as_deref() else {
        tracing::error!("No database URL: pass --database-url or set DATABASE_URL");
        return Ok(None);
    };

    tracing::info!("Connecting to database...");
    let store = PgJobStore::connect(url).await?;
    if cli.run_migrations {
        tracing::info!("Running database migrations...");
        store.run_migrations().await?;
        tracing::info!("Migrations complete");
    }
    Ok(Some(store))
}

async fn run_pipeline(
    cli: &Cli,
    cli_sources: &[String],
    test: bool,
    summary_dir: &Path,
) -> anyhow::Result<ExitCode> {
    let config = match SearchConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let names = match config.selected_sources(cli_sources) {
        Ok(names) => names,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let max_jobs = if test {
        tracing::info!("Test mode: at most {TEST_MODE_MAX_JOBS} jobs per source");
        TEST_MODE_MAX_JOBS.min(config.max_jobs_per_site)
    } else {
        config.max_jobs_per_site
    };

    let store = match connect(cli).await {
        Ok(Some(store)) => Arc::new(store),
        Ok(None) => return Ok(ExitCode::from(EXIT_CONFIG)),
        Err(e) => {
            tracing::error!("Cannot proceed without the job store: {e:#}");
            return Ok(ExitCode::from(EXIT_STORE));
        }
    };

    let today = Local::now().date_naive();
    let collectors = build_collectors(&names, &config, today)?;
    tracing::info!(sources = ?names, max_jobs, "Starting job collection");

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current source");
                interrupt.trigger();
            }
        });
    }

    let outcome = Orchestrator::new(collectors, Arc::clone(&store) as Arc<dyn JobStore>, max_jobs)
        .with_interrupt(interrupt)
        .run(today)
        .await;

    let code = match &outcome {
        RunOutcome::StoreUnavailable(e) => {
            tracing::error!("Cannot proceed without the job store: {e}");
            return Ok(ExitCode::from(EXIT_STORE));
        }
        RunOutcome::Completed(_) => ExitCode::SUCCESS,
        RunOutcome::PersistFailed { error, .. } => {
            tracing::error!("Run failed to store its results: {error}");
            ExitCode::from(EXIT_STORE)
        }
        RunOutcome::Interrupted { .. } => ExitCode::from(EXIT_INTERRUPTED),
    };

    if let Some(report) = outcome.report() {
        let stats = match &outcome {
            RunOutcome::Completed(_) => match store.stats().await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!("Failed to read store statistics: {e}");
                    None
                }
            },
            _ => None,
        };
        let summary = report::render_summary(report, &config, stats.as_ref());
        println!("{summary}");
        match report::write_summary(summary_dir, report, &summary) {
            Ok(path) => tracing::info!(path = %path.display(), "Summary saved"),
            Err(e) => tracing::warn!("Failed to save summary: {e}"),
        }

        let pending = outcome.pending();
        if !pending.is_empty() {
            match report::export_pending(summary_dir, report, pending) {
                Ok(path) => tracing::warn!(
                    path = %path.display(),
                    jobs = pending.len(),
                    "Unsaved jobs exported"
                ),
                Err(e) => {
                    tracing::error!(jobs = pending.len(), "Failed to export unsaved jobs: {e}")
                }
            }
        }
    }

    Ok(code)
}
