//! Idempotent upsert for synced products (§4.3): skips the write entirely when the
//! remote record's content hash matches what's already stored, and otherwise applies
//! the configured conflict strategy before writing.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::product::{Account, Product};
use crate::models::sync_log::ConflictStrategy;
use crate::sync::conflict::{self, ConflictOutcome};
use crate::sync::ApplyResult;

/// Hash of the fields that matter for "did this record actually change" purposes.
/// Deliberately excludes `updated_at`/`content_hash` themselves.
pub fn content_hash(product: &Product) -> String {
    let mut hasher = Sha256::new();
    hasher.update(product.name.as_bytes());
    hasher.update(product.stock.to_le_bytes());
    hasher.update(product.validation_status.to_le_bytes());
    if let Some(price) = product.sale_price {
        hasher.update(price.to_string().as_bytes());
    }
    hasher.update([product.active as u8]);
    format!("{:x}", hasher.finalize())
}

pub async fn apply_product(pool: &PgPool, strategy: ConflictStrategy, mut remote: Product) -> Result<ApplyResult, AppError> {
    remote.validate_invariants()?;
    remote.content_hash = Some(content_hash(&remote));

    let existing = sqlx::query_as::<_, Product>(
        "SELECT id, account, sku, remote_id, part_number_key, name, brand, category_id, eans, \
         sale_price, min_sale_price, max_sale_price, stock, validation_status, offer_validation_status, \
         active, images, characteristics, chinese_name, content_hash, created_at, updated_at \
         FROM products WHERE account = $1 AND sku = $2",
    )
    .bind(remote.account)
    .bind(&remote.sku)
    .fetch_optional(pool)
    .await?;

    let Some(local) = existing else {
        insert_product(pool, &remote).await?;
        return Ok(ApplyResult::Created);
    };

    if local.content_hash == remote.content_hash {
        return Ok(ApplyResult::Unchanged);
    }

    match conflict::resolve(strategy, local.updated_at, remote.updated_at) {
        ConflictOutcome::UseRemote => {
            update_product(pool, local.id, &remote).await?;
            Ok(ApplyResult::Updated)
        }
        ConflictOutcome::UseLocal => Ok(ApplyResult::Unchanged),
        ConflictOutcome::FlagForReview => {
            flag_for_manual_review(pool, local.id).await?;
            Ok(ApplyResult::Unchanged)
        }
    }
}

async fn insert_product(pool: &PgPool, product: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (account, sku, remote_id, part_number_key, name, brand, category_id, eans, \
         sale_price, min_sale_price, max_sale_price, stock, validation_status, offer_validation_status, \
         active, images, characteristics, chinese_name, content_hash, created_at, updated_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,now(),now())",
    )
    .bind(product.account)
    .bind(&product.sku)
    .bind(product.remote_id)
    .bind(&product.part_number_key)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(product.category_id)
    .bind(&product.eans)
    .bind(product.sale_price)
    .bind(product.min_sale_price)
    .bind(product.max_sale_price)
    .bind(product.stock)
    .bind(product.validation_status)
    .bind(product.offer_validation_status)
    .bind(product.active)
    .bind(&product.images)
    .bind(&product.characteristics)
    .bind(&product.chinese_name)
    .bind(&product.content_hash)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_product(pool: &PgPool, id: i64, product: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET remote_id=$2, part_number_key=$3, name=$4, brand=$5, category_id=$6, eans=$7, \
         sale_price=$8, min_sale_price=$9, max_sale_price=$10, stock=$11, validation_status=$12, \
         offer_validation_status=$13, active=$14, images=$15, characteristics=$16, chinese_name=$17, \
         content_hash=$18, updated_at=now() WHERE id=$1",
    )
    .bind(id)
    .bind(product.remote_id)
    .bind(&product.part_number_key)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(product.category_id)
    .bind(&product.eans)
    .bind(product.sale_price)
    .bind(product.min_sale_price)
    .bind(product.max_sale_price)
    .bind(product.stock)
    .bind(product.validation_status)
    .bind(product.offer_validation_status)
    .bind(product.active)
    .bind(&product.images)
    .bind(&product.characteristics)
    .bind(&product.chinese_name)
    .bind(&product.content_hash)
    .execute(pool)
    .await?;
    Ok(())
}

/// §4.3 "missing remotely": after a completed `full` sync, any active local product
/// with a `remote_id` that wasn't seen in this run no longer exists on the remote
/// catalog and is soft-deactivated. Never applied under `manual` conflict strategy,
/// and never touches products that were never linked to a remote id in the first place.
pub async fn deactivate_missing(pool: &PgPool, account: Account, seen_remote_ids: &HashSet<i64>) -> Result<u64, AppError> {
    let ids: Vec<i64> = seen_remote_ids.iter().copied().collect();
    let result = sqlx::query(
        "UPDATE products SET active = false, updated_at = now() \
         WHERE account = $1 AND active = true AND remote_id IS NOT NULL AND NOT (remote_id = ANY($2))",
    )
    .bind(account)
    .bind(&ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

async fn flag_for_manual_review(pool: &PgPool, product_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO manual_review_queue (product_id, created_at) VALUES ($1, now())")
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn product(stock: i32) -> Product {
        Product {
            id: 1,
            account: crate::models::product::Account::Main,
            sku: "sku-1".into(),
            remote_id: Some(1),
            part_number_key: None,
            name: "Widget".into(),
            brand: None,
            category_id: None,
            eans: vec![],
            sale_price: None,
            min_sale_price: None,
            max_sale_price: None,
            stock,
            validation_status: 9,
            offer_validation_status: Some(1),
            active: true,
            images: serde_json::Value::Null,
            characteristics: serde_json::Value::Null,
            chinese_name: None,
            content_hash: None,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn identical_records_hash_identically() {
        assert_eq!(content_hash(&product(5)), content_hash(&product(5)));
    }

    #[test]
    fn stock_change_changes_the_hash() {
        assert_ne!(content_hash(&product(5)), content_hash(&product(6)));
    }
}
