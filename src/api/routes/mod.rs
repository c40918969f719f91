//! HTTP route table: a thin `nest`/`route` wiring layer over `api::handlers`,
//! mirroring the teacher's `api/routes/mod.rs::create_router`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers;
use crate::state::AppState;

/// Builds the route table unscoped to any particular `AppState` value; `main.rs`
/// attaches state once via `.with_state` after nesting this under `/api/v1`.
pub fn create_router() -> Router<Arc<AppState>> {
    let catalog_routes = Router::new()
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/:id", get(handlers::catalog::get_product));

    let sync_routes = Router::new()
        .route("/sync", post(handlers::sync::submit_sync))
        .route("/sync/status", get(handlers::sync::get_status))
        .route("/sync/:id", get(handlers::sync::get_sync_log))
        .route("/sync/:id/cancel", post(handlers::sync::cancel_sync));

    let matching_routes = Router::new()
        .route("/matching/pending", get(handlers::matching::list_pending))
        .route("/matching/:id/confirm", post(handlers::matching::confirm_match))
        .route("/matching/:id/unmatch", post(handlers::matching::unmatch))
        .route("/matching/rematch-all", post(handlers::matching::rematch_all));

    let reorder_routes = Router::new()
        .route("/reorder/suggestions", get(handlers::reorder::list_reorder_suggestions))
        .route("/reorder/draft", post(handlers::reorder::create_drafts));

    Router::new()
        .merge(catalog_routes)
        .merge(sync_routes)
        .merge(matching_routes)
        .merge(reorder_routes)
}
