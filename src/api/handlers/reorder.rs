//! Reorder/PO engine control surface (C6, §4.6): low-stock suggestions and bulk
//! draft-PO assembly.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::inventory::InventoryItem;
use crate::models::purchase_order::PurchaseOrderStatus;
use crate::reorder::{ReorderEngine, ReorderLine, SupplierCatalogEntry};
use crate::state::AppState;
use crate::utils::response::ApiResponse;

/// Sums `ordered - received` across open (non-terminal, non-cancelled) PO lines per
/// product (§4.6 "pending-PO netting").
async fn pending_po_quantity_by_product(pool: &sqlx::PgPool) -> Result<HashMap<i64, i32>, AppError> {
    let rows: Vec<(i64, i32)> = sqlx::query_as(
        "SELECT l.product_id, SUM(l.ordered_qty - l.received_qty)::int \
         FROM purchase_order_lines l JOIN purchase_orders po ON po.id = l.purchase_order_id \
         WHERE po.status IN ('sent', 'confirmed', 'partially_received') \
         GROUP BY l.product_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn list_reorder_suggestions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ReorderLine>>>, AppError> {
    let inventory = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, product_id, warehouse_id, quantity, reserved_quantity, minimum_stock, \
         reorder_point, maximum_stock, manual_reorder_quantity FROM inventory_items",
    )
    .fetch_all(&state.db.pool)
    .await?;

    let pending = pending_po_quantity_by_product(&state.db.pool).await?;
    let lines = ReorderEngine::compute_reorder_lines(&inventory, &pending);
    Ok(Json(ApiResponse::success(lines)))
}

#[derive(Debug, Deserialize)]
pub struct SupplierSelection {
    pub product_id: i64,
    pub supplier_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub selections: Vec<SupplierSelection>,
    pub actor: String,
}

#[derive(Debug, Serialize)]
pub struct DraftReport {
    pub created: Vec<String>,
    pub failed: Vec<DraftFailure>,
}

#[derive(Debug, Serialize)]
pub struct DraftFailure {
    pub supplier_id: i64,
    pub reason: String,
}

/// Bulk draft assembly (§4.6): groups by supplier, picks unit cost by the §4.6 priority
/// (supplier-sheet price -> supplier-product price -> product base price), and writes
/// one draft PO per supplier. A failure for one supplier does not abort the batch.
pub async fn create_drafts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<ApiResponse<DraftReport>>, AppError> {
    let inventory = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, product_id, warehouse_id, quantity, reserved_quantity, minimum_stock, \
         reorder_point, maximum_stock, manual_reorder_quantity FROM inventory_items \
         WHERE product_id = ANY($1)",
    )
    .bind(&request.selections.iter().map(|s| s.product_id).collect::<Vec<_>>())
    .fetch_all(&state.db.pool)
    .await?;

    let pending = pending_po_quantity_by_product(&state.db.pool).await?;
    let reorder_lines = ReorderEngine::compute_reorder_lines(&inventory, &pending);
    let reorder_qty_by_product: HashMap<i64, i32> =
        reorder_lines.into_iter().map(|l| (l.product_id, l.quantity)).collect();

    let catalog = build_supplier_catalog(&state.db.pool, &request.selections, &reorder_qty_by_product).await?;
    let lines: Vec<ReorderLine> = request
        .selections
        .iter()
        .filter_map(|sel| {
            reorder_qty_by_product
                .get(&sel.product_id)
                .filter(|qty| **qty > 0)
                .map(|qty| ReorderLine { product_id: sel.product_id, quantity: *qty })
        })
        .collect();

    let exchange_rates = load_exchange_rates(&state.db.pool, state.config.cny_exchange_rate).await?;
    let now = Utc::now().naive_utc();
    let drafts = ReorderEngine::assemble_draft_pos(&lines, &catalog, &exchange_rates, &request.actor, now);

    let mut created = Vec::new();
    let mut failed = Vec::new();
    for draft in drafts {
        match persist_draft(&state.db.pool, &draft, &request.actor, now).await {
            Ok(order_number) => created.push(order_number),
            Err(err) => failed.push(DraftFailure { supplier_id: draft.supplier_id, reason: err.to_string() }),
        }
    }

    crate::metrics::record_draft_po();
    Ok(Json(ApiResponse::success(DraftReport { created, failed })))
}

/// Priority: a dedicated supplier-sheet price, falling back to the supplier_products
/// row's own price, falling back to the product's own base sale price (§4.6.b).
async fn build_supplier_catalog(
    pool: &sqlx::PgPool,
    selections: &[SupplierSelection],
    reorder_qty_by_product: &HashMap<i64, i32>,
) -> Result<Vec<SupplierCatalogEntry>, AppError> {
    let mut catalog = Vec::new();
    for sel in selections {
        if !reorder_qty_by_product.contains_key(&sel.product_id) {
            continue;
        }
        let sheet_price: Option<Decimal> = sqlx::query_scalar(
            "SELECT price FROM supplier_sheet_prices WHERE supplier_id = $1 AND product_id = $2",
        )
        .bind(sel.supplier_id)
        .bind(sel.product_id)
        .fetch_optional(pool)
        .await?;

        let supplier_product_price: Option<Decimal> = sqlx::query_scalar(
            "SELECT price FROM supplier_products sp JOIN products p ON p.id = sp.linked_local_product_id \
             WHERE sp.supplier_id = $1 AND p.id = $2",
        )
        .bind(sel.supplier_id)
        .bind(sel.product_id)
        .fetch_optional(pool)
        .await?;

        let base_price: Option<Decimal> =
            sqlx::query_scalar("SELECT sale_price FROM products WHERE id = $1").bind(sel.product_id).fetch_optional(pool).await?.flatten();

        let unit_cost = sheet_price
            .or(supplier_product_price)
            .or(base_price)
            .ok_or_else(|| AppError::new(crate::error::ErrorKind::RemoteValidation, format!("no price available for product {}", sel.product_id)))?;

        let is_cn_supplier: bool = sqlx::query_scalar(
            "SELECT country_code = 'CN' OR supplier_code LIKE '1688_%' OR supplier_code LIKE 'sheet_%' \
             FROM suppliers WHERE id = $1",
        )
        .bind(sel.supplier_id)
        .fetch_optional(pool)
        .await?
        .unwrap_or(false);

        let currency = if is_cn_supplier { "CNY".to_string() } else { "RON".to_string() };

        catalog.push(SupplierCatalogEntry { supplier_id: sel.supplier_id, product_id: sel.product_id, unit_cost, currency });
    }
    Ok(catalog)
}

/// `exchange_rates` is the source of truth; `cny_exchange_rate` from config is only a
/// fallback for a fresh install before anyone has populated the table.
async fn load_exchange_rates(pool: &sqlx::PgPool, cny_fallback: Decimal) -> Result<HashMap<String, Decimal>, AppError> {
    let rows: Vec<(String, Decimal)> = sqlx::query_as("SELECT currency, rate FROM exchange_rates").fetch_all(pool).await?;
    let mut rates: HashMap<String, Decimal> = rows.into_iter().collect();
    rates.entry("RON".to_string()).or_insert(Decimal::ONE);
    rates.entry("CNY".to_string()).or_insert(cny_fallback);
    Ok(rates)
}

/// Generates `PO-YYYYMMDD-NNNN`, inserts the PO/lines/history row, and is a safe no-op
/// on retry: a unique constraint on `idempotence_key` makes a repeated assembly within
/// the same minute bucket return the already-created order number instead of duplicating.
async fn persist_draft(
    pool: &sqlx::PgPool,
    draft: &crate::reorder::DraftPurchaseOrder,
    actor: &str,
    now: chrono::NaiveDateTime,
) -> Result<String, AppError> {
    if let Some(existing) =
        sqlx::query_scalar::<_, String>("SELECT order_number FROM purchase_orders WHERE idempotence_key = $1")
            .bind(&draft.idempotence_key)
            .fetch_optional(pool)
            .await?
    {
        return Ok(existing);
    }

    let sequence: i64 = sqlx::query_scalar("SELECT nextval('purchase_order_number_seq')").fetch_one(pool).await?;
    let order_number = format!("PO-{}-{:04}", now.format("%Y%m%d"), sequence % 10000);

    let mut tx = pool.begin().await?;
    let po_id: i64 = sqlx::query_scalar(
        "INSERT INTO purchase_orders (order_number, supplier_id, status, currency, exchange_rate, \
         total_value, order_date, idempotence_key) VALUES ($1,$2,$3,$4,$5,$6,$7,$8) RETURNING id",
    )
    .bind(&order_number)
    .bind(draft.supplier_id)
    .bind(PurchaseOrderStatus::Draft)
    .bind(&draft.currency)
    .bind(draft.exchange_rate)
    .bind(draft.total_value)
    .bind(now)
    .bind(&draft.idempotence_key)
    .fetch_one(&mut *tx)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            "INSERT INTO purchase_order_lines (purchase_order_id, product_id, ordered_qty, received_qty, unit_cost) \
             VALUES ($1,$2,$3,0,$4)",
        )
        .bind(po_id)
        .bind(line.product_id)
        .bind(line.ordered_qty)
        .bind(line.unit_cost)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("INSERT INTO purchase_order_history (purchase_order_id, event, actor, created_at) VALUES ($1,'created',$2,$3)")
        .bind(po_id)
        .bind(actor)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(order_number)
}
