//! Shared application state threaded through every Axum handler, the way the teacher's
//! `main.rs::AppState` bundles config/db/cache/engines behind `Arc<AppState>`.

use std::sync::Arc;

use crate::api_client::MarketplaceApiClient;
use crate::cache::CacheManager;
use crate::concurrency::ConcurrencyController;
use crate::config::AppConfig;
use crate::db::Database;
use crate::matching::MatchingEngine;
use crate::sync::progress::ProgressTracker;
use crate::sync::SyncEngine;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub cache: Arc<CacheManager>,
    pub api_client: Arc<MarketplaceApiClient>,
    pub sync_engine: Arc<SyncEngine>,
    pub concurrency: Arc<ConcurrencyController>,
    pub progress: Arc<ProgressTracker>,
    pub matching_engine: Arc<MatchingEngine>,
}
