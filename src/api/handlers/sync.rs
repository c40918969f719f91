//! Sync control-plane endpoints (C4's public surface, §4.4, §6.5's HTTP twin of the CLI).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::models::product::Account;
use crate::models::sync_log::{ConflictStrategy, Resource, SyncLog, SyncMode};
use crate::state::AppState;
use crate::utils::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct SubmitSyncRequest {
    pub account: String,
    pub resource: Resource,
    pub mode: SyncMode,
    #[serde(default)]
    pub conflict_strategy: Option<ConflictStrategy>,
    pub actor: String,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitSyncResponse {
    pub sync_log_id: i64,
}

/// `start_sync` (§4.3): validates the request, durably queues it, and returns
/// immediately. The background task does the paged pull.
pub async fn submit_sync(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitSyncRequest>,
) -> Result<Json<ApiResponse<SubmitSyncResponse>>, AppError> {
    let account = Account::from_str(&request.account)?;

    if state.concurrency.is_running(account, request.resource) {
        return Err(AppError::new(
            ErrorKind::Busy,
            format!("a sync is already running for {account}/{:?}", request.resource),
        ));
    }

    let sync_log_id = state
        .sync_engine
        .start_sync(
            state.db.pool.clone(),
            state.api_client.clone(),
            account,
            request.resource,
            request.mode,
            request.conflict_strategy.unwrap_or_default(),
            request.actor,
            request.max_pages.or(state.config.sync_max_pages),
            Some(std::time::Duration::from_secs(state.config.sync_wall_clock_cap_secs)),
        )
        .await?;

    Ok(Json(ApiResponse::success(SubmitSyncResponse { sync_log_id })))
}

#[derive(Debug, Deserialize)]
pub struct SyncStatusQuery {
    pub account: String,
    pub resource: Resource,
}

/// `status(account, resource)` (§4.3): the most recent log row for the key. The UI
/// is expected to poll this every 5s (§4.4) rather than hold an open connection.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncStatusQuery>,
) -> Result<Json<ApiResponse<SyncLog>>, AppError> {
    let account = Account::from_str(&query.account)?;
    let log = sqlx::query_as::<_, SyncLog>(
        "SELECT id, account, resource, mode, status, started_at, finished_at, total_items, \
         processed_items, created_count, updated_count, failed_count, error_message, actor, \
         cancel_requested FROM sync_logs WHERE account = $1 AND resource = $2 \
         ORDER BY started_at DESC NULLS LAST, id DESC LIMIT 1",
    )
    .bind(account)
    .bind(query.resource)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::new(ErrorKind::RemoteValidation, "no sync has ever run for this account/resource"))?;

    Ok(Json(ApiResponse::success(log)))
}

/// `cancel(sync_log_id)` (§4.3): cooperative, takes effect at the next page boundary.
pub async fn cancel_sync(
    State(state): State<Arc<AppState>>,
    Path(sync_log_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state.sync_engine.cancel_sync(&state.db.pool, sync_log_id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({ "cancelled": true }))))
}

pub async fn get_sync_log(
    State(state): State<Arc<AppState>>,
    Path(sync_log_id): Path<i64>,
) -> Result<Json<ApiResponse<SyncLog>>, AppError> {
    let log = state.sync_engine.get_status(&state.db.pool, sync_log_id).await?;
    Ok(Json(ApiResponse::success(log)))
}
