//! Operator-facing batch CLI surface (§6.5). The one place in this crate allowed to
//! `println!` directly — every other code path logs through `tracing`.

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use emag_sync_core::api_client::MarketplaceApiClient;
use emag_sync_core::concurrency::ConcurrencyController;
use emag_sync_core::config::AppConfig;
use emag_sync_core::db::Database;
use emag_sync_core::error::ErrorKind;
use emag_sync_core::models::product::Account;
use emag_sync_core::models::sync_log::{ConflictStrategy, Resource, SyncMode, SyncStatus};
use emag_sync_core::rate_limiter::RateLimiter;
use emag_sync_core::sync::progress::ProgressTracker;
use emag_sync_core::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "emag-sync-cli", about = "Batch operator entrypoint for the eMAG sync core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// `sync --account {main|fbe|both} --resource {products|offers|orders} --mode {full|incremental|selective}`
    Sync {
        #[arg(long, value_parser = ["main", "fbe", "both"])]
        account: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        mode: String,
        #[arg(long)]
        max_pages: Option<u32>,
        #[arg(long)]
        r#async: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Command::Sync { account, resource, mode, max_pages, r#async } = cli.command;

    let resource = parse_resource(&resource)?;
    let mode = parse_mode(&mode)?;

    let config = AppConfig::load()?;
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    emag_sync_core::sync::reconcile_boot(&db.pool).await?;

    let rate_limiter = Arc::new(RateLimiter::with_default_jitter());
    for (&(acct, class), &spec) in &config.rate_limit_overrides {
        rate_limiter.configure(acct, class, spec);
    }
    let api_client = Arc::new(MarketplaceApiClient::new(config.accounts.clone(), rate_limiter));
    let concurrency = Arc::new(ConcurrencyController::new(Duration::from_secs(config.sync_lock_ttl_secs)));
    let progress = Arc::new(ProgressTracker::new());
    let engine = Arc::new(SyncEngine::new(concurrency, progress).with_page_size(config.sync_page_size));

    let accounts = match account.as_str() {
        "both" => vec![Account::Main, Account::Fbe],
        other => vec![Account::from_str(other).map_err(|_| anyhow::anyhow!("invalid account"))?],
    };

    let mut submitted = Vec::new();
    for acct in accounts {
        match engine
            .start_sync(
                db.pool.clone(),
                api_client.clone(),
                acct,
                resource,
                mode,
                ConflictStrategy::default(),
                "cli".to_string(),
                max_pages.or(config.sync_max_pages),
                Some(Duration::from_secs(config.sync_wall_clock_cap_secs)),
            )
            .await
        {
            Ok(sync_log_id) => {
                println!("submitted sync_log_id={sync_log_id} account={acct} resource={resource:?} mode={mode:?}");
                submitted.push(sync_log_id);
            }
            Err(err) if err.kind == ErrorKind::Busy => {
                eprintln!("busy: {}", err.message);
                return Ok(ExitCode::from(2));
            }
            Err(err) => {
                eprintln!("submission failed: {}", err.message);
                return Ok(ExitCode::from(1));
            }
        }
    }

    if r#async {
        return Ok(ExitCode::SUCCESS);
    }

    // Synchronous mode: poll each submitted log to a terminal status before exiting,
    // the way the UI polls `status(account, resource)` every 5s (§4.4), just tighter.
    for sync_log_id in submitted {
        loop {
            let log = engine.get_status(&db.pool, sync_log_id).await?;
            if log.status.is_terminal() {
                println!(
                    "sync_log_id={sync_log_id} status={:?} processed={} created={} updated={} failed={}",
                    log.status, log.processed_items, log.created_count, log.updated_count, log.failed_count
                );
                if log.status == SyncStatus::Failed {
                    return Ok(ExitCode::from(1));
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_resource(s: &str) -> anyhow::Result<Resource> {
    match s {
        "products" => Ok(Resource::Products),
        "offers" => Ok(Resource::Offers),
        "orders" => Ok(Resource::Orders),
        other => Err(anyhow::anyhow!("invalid resource '{other}', expected products|offers|orders")),
    }
}

fn parse_mode(s: &str) -> anyhow::Result<SyncMode> {
    match s {
        "full" => Ok(SyncMode::Full),
        "incremental" => Ok(SyncMode::Incremental),
        "selective" => Ok(SyncMode::Selective),
        other => Err(anyhow::anyhow!("invalid mode '{other}', expected full|incremental|selective")),
    }
}
