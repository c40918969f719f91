//! Read-only catalog browsing endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::product::Product;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub account: Option<String>,
    pub active_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let active_only = query.active_only.unwrap_or(true);

    let mut sql = String::from(
        "SELECT id, account, sku, remote_id, part_number_key, name, brand, category_id, eans, \
         sale_price, min_sale_price, max_sale_price, stock, validation_status, offer_validation_status, \
         active, images, characteristics, chinese_name, content_hash, created_at, updated_at \
         FROM products WHERE ($1::text IS NULL OR account = $1)",
    );
    if active_only {
        sql.push_str(" AND active = true");
    }
    sql.push_str(" ORDER BY id LIMIT $2 OFFSET $3");

    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(query.account)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> Result<Json<Product>, AppError> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, account, sku, remote_id, part_number_key, name, brand, category_id, eans, \
         sale_price, min_sale_price, max_sale_price, stock, validation_status, offer_validation_status, \
         active, images, characteristics, chinese_name, content_hash, created_at, updated_at \
         FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_one(&state.db.pool)
    .await?;

    Ok(Json(product))
}
