//! Matching engine control surface (C5, §4.5): list pending candidates, confirm/unmatch
//! a single link, and trigger "re-match all" for a supplier.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::models::product::Product;
use crate::models::supplier_product::SupplierProduct;
use crate::state::AppState;
use crate::utils::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct ListPendingQuery {
    pub supplier_id: Option<i64>,
}

async fn fetch_supplier_products(
    pool: &sqlx::PgPool,
    supplier_id: Option<i64>,
) -> Result<Vec<SupplierProduct>, AppError> {
    let rows = sqlx::query_as::<_, SupplierProduct>(
        "SELECT id, supplier_id, raw_name, normalized_tokens, image_url, price, url, \
         linked_local_product_id, similarity_score, manual_confirmed, confirmed_by, confirmed_at \
         FROM supplier_products WHERE ($1::bigint IS NULL OR supplier_id = $1) ORDER BY id",
    )
    .bind(supplier_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rows whose `manual_confirmed = false` (auto-matched, awaiting human review).
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPendingQuery>,
) -> Result<Json<ApiResponse<Vec<SupplierProduct>>>, AppError> {
    let rows = fetch_supplier_products(&state.db.pool, query.supplier_id)
        .await?
        .into_iter()
        .filter(|sp| sp.manual_confirmed == Some(false))
        .collect();
    Ok(Json(ApiResponse::success(rows)))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmMatchRequest {
    pub confirmed_by: String,
}

/// pending -> confirmed. Fails `ConflictExists` if another row already holds a
/// confirmed link to the same local product (§4.5 invariant: at most one confirmed
/// match per supplier per local product).
pub async fn confirm_match(
    State(state): State<Arc<AppState>>,
    Path(supplier_product_id): Path<i64>,
    Json(request): Json<ConfirmMatchRequest>,
) -> Result<Json<ApiResponse<SupplierProduct>>, AppError> {
    let mut sp = load_supplier_product(&state.db.pool, supplier_product_id).await?;

    if let Some(local_product_id) = sp.linked_local_product_id {
        // §4.5: "at most one confirmed match per supplier per local product" — scoped to
        // this supplier, not a global lock on the product (other suppliers may each hold
        // their own confirmed link to the same local product).
        let existing_confirmed: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM supplier_products WHERE linked_local_product_id = $1 \
             AND supplier_id = $2 AND manual_confirmed = true AND id <> $3",
        )
        .bind(local_product_id)
        .bind(sp.supplier_id)
        .bind(supplier_product_id)
        .fetch_optional(&state.db.pool)
        .await?;
        if existing_confirmed.is_some() {
            return Err(AppError::new(
                ErrorKind::ConflictExists,
                format!("supplier {} already has a confirmed match for local product {local_product_id}", sp.supplier_id),
            ));
        }
    }

    sp.confirm(&request.confirmed_by, Utc::now().naive_utc())?;
    persist_supplier_product(&state.db.pool, &sp).await?;
    Ok(Json(ApiResponse::success(sp)))
}

/// Any state -> unmatched; nullifies the three companion fields atomically (§3.3).
pub async fn unmatch(
    State(state): State<Arc<AppState>>,
    Path(supplier_product_id): Path<i64>,
) -> Result<Json<ApiResponse<SupplierProduct>>, AppError> {
    let mut sp = load_supplier_product(&state.db.pool, supplier_product_id).await?;
    sp.unmatch();
    persist_supplier_product(&state.db.pool, &sp).await?;
    Ok(Json(ApiResponse::success(sp)))
}

#[derive(Debug, Deserialize)]
pub struct RematchAllRequest {
    pub supplier_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RematchAllResponse {
    pub rematched: usize,
    pub results: Vec<SupplierProduct>,
}

/// "Re-match all" (§4.5): unlinks every `pending` row of a supplier (never `confirmed`),
/// then re-runs the pipeline against the current product set.
pub async fn rematch_all(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RematchAllRequest>,
) -> Result<Json<ApiResponse<RematchAllResponse>>, AppError> {
    let mut rows = fetch_supplier_products(&state.db.pool, Some(request.supplier_id)).await?;
    let candidates = sqlx::query_as::<_, Product>(
        "SELECT id, account, sku, remote_id, part_number_key, name, brand, category_id, eans, \
         sale_price, min_sale_price, max_sale_price, stock, validation_status, offer_validation_status, \
         active, images, characteristics, chinese_name, content_hash, created_at, updated_at \
         FROM products WHERE active = true",
    )
    .fetch_all(&state.db.pool)
    .await?;

    state.matching_engine.rematch_all(&mut rows, &candidates);

    let supplier_label = request.supplier_id.to_string();
    for sp in &rows {
        persist_supplier_product(&state.db.pool, sp).await?;
        if sp.linked_local_product_id.is_some() && sp.manual_confirmed == Some(false) {
            crate::metrics::record_auto_match(&supplier_label);
        }
    }

    Ok(Json(ApiResponse::success(RematchAllResponse { rematched: rows.len(), results: rows })))
}

async fn load_supplier_product(pool: &sqlx::PgPool, id: i64) -> Result<SupplierProduct, AppError> {
    sqlx::query_as::<_, SupplierProduct>(
        "SELECT id, supplier_id, raw_name, normalized_tokens, image_url, price, url, \
         linked_local_product_id, similarity_score, manual_confirmed, confirmed_by, confirmed_at \
         FROM supplier_products WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)
}

async fn persist_supplier_product(pool: &sqlx::PgPool, sp: &SupplierProduct) -> Result<(), AppError> {
    sp.validate_invariants()?;
    sqlx::query(
        "UPDATE supplier_products SET linked_local_product_id = $2, similarity_score = $3, \
         manual_confirmed = $4, confirmed_by = $5, confirmed_at = $6 WHERE id = $1",
    )
    .bind(sp.id)
    .bind(sp.linked_local_product_id)
    .bind(sp.similarity_score)
    .bind(sp.manual_confirmed)
    .bind(&sp.confirmed_by)
    .bind(sp.confirmed_at)
    .execute(pool)
    .await?;
    Ok(())
}
