use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emag_sync_core::api;
use emag_sync_core::api_client::MarketplaceApiClient;
use emag_sync_core::cache::{CacheConfig, CacheManager};
use emag_sync_core::concurrency::ConcurrencyController;
use emag_sync_core::config::AppConfig;
use emag_sync_core::db::Database;
use emag_sync_core::matching::MatchingEngine;
use emag_sync_core::metrics;
use emag_sync_core::rate_limiter::RateLimiter;
use emag_sync_core::state::AppState;
use emag_sync_core::sync::progress::ProgressTracker;
use emag_sync_core::sync::SyncEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emag_sync_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting eMAG Sync Core v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.environment, "loaded configuration");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    tracing::info!("database connected and migrated");

    let reconciled = emag_sync_core::sync::reconcile_boot(&db.pool).await?;
    if reconciled > 0 {
        tracing::warn!(count = reconciled, "reconciled sync_logs rows left running by a crashed process");
    }

    let cache = Arc::new(CacheManager::new(CacheConfig { redis_url: config.redis_url.clone(), max_retries: 3, retry_delay_ms: 100 }).await);
    if cache.is_available() {
        tracing::info!("progress fan-out connected to Redis");
    } else {
        tracing::warn!("Redis unavailable; progress fan-out will run in-process only (graceful degradation)");
    }

    let rate_limiter = Arc::new(RateLimiter::with_default_jitter());
    for (&(account, class), &spec) in &config.rate_limit_overrides {
        rate_limiter.configure(account, class, spec);
    }

    let api_client = Arc::new(MarketplaceApiClient::new(config.accounts.clone(), rate_limiter.clone()));

    let concurrency = Arc::new(ConcurrencyController::new(Duration::from_secs(config.sync_lock_ttl_secs)));
    concurrency
        .clone()
        .spawn_sweeper(db.pool.clone(), Duration::from_secs(config.orphan_sweep_interval_secs));
    tracing::info!("orphan sync lock sweeper started");

    let progress = Arc::new(ProgressTracker::new());
    let sync_engine = Arc::new(
        SyncEngine::new(concurrency.clone(), progress.clone())
            .with_cache(cache.clone())
            .with_page_size(config.sync_page_size),
    );
    let matching_engine = Arc::new(MatchingEngine::new(config.matching_similarity_threshold));

    metrics::init_metrics();
    tracing::info!("Prometheus metrics recorder installed");

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        cache,
        api_client,
        sync_engine,
        concurrency,
        progress,
        matching_engine,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes::create_router())
        .layer(axum_middleware::from_fn(api::middleware::metrics_middleware))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
