//! Embedding Cleanup
//!
//! One-shot job that scans the embeddings table for rows whose parent
//! document is missing or soft-deleted past the grace period, and deletes
//! them in bounded batches. Defaults to execute mode; pass `--dry-run` to
//! report without deleting.

use clap::Parser;
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_embeddings::{
    CancelFlag, CleanupMode, CleanupOutcome, CleanupService, PgEmbeddingStore, RunStatus,
};
use eyre::Result;
use observability::CleanupMetrics;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod report;

use config::Config;

#[derive(Parser)]
#[command(name = "embedding-cleanup")]
#[command(about = "Remove embedding rows whose parent document is gone")]
struct Cli {
    /// Report orphans without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Rows fetched per scan page
    #[arg(long)]
    scan_batch_size: Option<u64>,

    /// Orphans deleted per transaction
    #[arg(long)]
    delete_batch_size: Option<usize>,

    /// Hours a soft-deleted document stays exempt from cleanup
    #[arg(long)]
    grace_period_hours: Option<i64>,

    /// Wall-clock budget in seconds; 0 = unbounded
    #[arg(long)]
    max_runtime_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    install_color_eyre();

    let mut config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    // Initialize metrics
    observability::init_metrics();

    let cli = Cli::parse();
    apply_overrides(&mut config, &cli);

    let mode = if cli.dry_run {
        CleanupMode::DryRun
    } else {
        CleanupMode::Execute
    };

    // Connect to database
    info!("Connecting to database...");
    let db = match database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
    {
        Ok(db) => db,
        Err(e) => return Ok(connection_failure(mode, &e.to_string())),
    };

    if let Err(e) = database::postgres::check_health(&db).await {
        let code = connection_failure(mode, &e.to_string());
        db.close().await.ok();
        return Ok(code);
    }

    // SIGINT/SIGTERM finish the in-flight batch, then stop scheduling
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        });
    }

    let service = CleanupService::new(PgEmbeddingStore::new(db.clone()), config.options.clone());
    let outcome = service.run(mode, cancel).await;

    record_metrics(&outcome);
    report::emit(&outcome);

    db.close().await.ok();

    Ok(report::exit_code(outcome.status))
}

/// CLI flags win over environment variables
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(size) = cli.scan_batch_size {
        config.options.scan_batch_size = size;
    }
    if let Some(size) = cli.delete_batch_size {
        config.options.delete_batch_size = size;
    }
    if let Some(hours) = cli.grace_period_hours {
        config.options.grace_period_hours = hours;
    }
    if let Some(secs) = cli.max_runtime_secs {
        config.options.max_runtime = (secs > 0).then(|| Duration::from_secs(secs));
    }
}

/// A store that cannot be reached still produces a reportable outcome
fn connection_failure(mode: CleanupMode, error: &str) -> ExitCode {
    let mut outcome = CleanupOutcome::start(mode);
    outcome.error = Some(error.to_string());
    outcome.finish(RunStatus::Failed);

    record_metrics(&outcome);
    report::emit(&outcome);

    report::exit_code(RunStatus::Failed)
}

fn record_metrics(outcome: &CleanupOutcome) {
    CleanupMetrics::record_run(
        &outcome.mode.to_string(),
        &outcome.status.to_string(),
        outcome.scanned,
        outcome.missing_parent,
        outcome.parent_deleted,
        outcome.deleted,
        outcome.failed_batches,
        outcome.duration_ms,
    );
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, finishing current batch before stopping...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, finishing current batch before stopping...");
        },
    }
}
