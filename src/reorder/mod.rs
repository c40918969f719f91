//! Reorder/PO engine (C6, §4.6): turns inventory shortfalls into draft purchase orders,
//! netting against quantities already on an open PO and grouping by supplier so one
//! draft PO per supplier carries its own currency and exchange rate.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::inventory::InventoryItem;
use crate::models::purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};

#[derive(Debug, Clone)]
pub struct SupplierCatalogEntry {
    pub supplier_id: i64,
    pub product_id: i64,
    pub unit_cost: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// A fully-formed draft PO, not yet persisted.
#[derive(Debug, Clone)]
pub struct DraftPurchaseOrder {
    pub supplier_id: i64,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub lines: Vec<PurchaseOrderLine>,
    pub total_value: Decimal,
    pub idempotence_key: String,
}

pub struct ReorderEngine;

impl ReorderEngine {
    /// §4.6: net the raw reorder formula against quantity already on an open (non-terminal,
    /// non-cancelled) PO for that product, so outstanding orders aren't duplicated.
    pub fn compute_reorder_lines(
        inventory: &[InventoryItem],
        pending_po_quantity_by_product: &HashMap<i64, i32>,
    ) -> Vec<ReorderLine> {
        inventory
            .iter()
            .filter_map(|item| {
                let raw = item.reorder_quantity();
                let pending = pending_po_quantity_by_product.get(&item.product_id).copied().unwrap_or(0);
                let net = (raw - pending).max(0);
                (net > 0).then_some(ReorderLine { product_id: item.product_id, quantity: net })
            })
            .collect()
    }

    /// Groups reorder lines by supplier (via the supplier's catalog entries, taking the
    /// cheapest listed supplier for each product) and assembles one draft PO per supplier.
    pub fn assemble_draft_pos(
        lines: &[ReorderLine],
        catalog: &[SupplierCatalogEntry],
        exchange_rates: &HashMap<String, Decimal>,
        actor: &str,
        now: NaiveDateTime,
    ) -> Vec<DraftPurchaseOrder> {
        let mut best_supplier_for_product: HashMap<i64, &SupplierCatalogEntry> = HashMap::new();
        for entry in catalog {
            best_supplier_for_product
                .entry(entry.product_id)
                .and_modify(|current| {
                    if entry.unit_cost < current.unit_cost {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }

        let mut lines_by_supplier: HashMap<i64, Vec<PurchaseOrderLine>> = HashMap::new();
        let mut currency_by_supplier: HashMap<i64, String> = HashMap::new();

        for line in lines {
            let Some(entry) = best_supplier_for_product.get(&line.product_id) else {
                continue;
            };
            currency_by_supplier.insert(entry.supplier_id, entry.currency.clone());
            lines_by_supplier.entry(entry.supplier_id).or_default().push(PurchaseOrderLine {
                id: 0,
                purchase_order_id: 0,
                product_id: line.product_id,
                ordered_qty: line.quantity,
                received_qty: 0,
                unit_cost: entry.unit_cost,
            });
        }

        let mut drafts = Vec::new();
        for (supplier_id, mut po_lines) in lines_by_supplier {
            po_lines.sort_by_key(|l| l.product_id);
            let product_ids: Vec<i64> = po_lines.iter().map(|l| l.product_id).collect();
            let currency = currency_by_supplier.remove(&supplier_id).unwrap_or_else(|| "RON".to_string());
            let exchange_rate = exchange_rates.get(&currency).copied().unwrap_or(Decimal::ONE);
            let total_value = PurchaseOrder::compute_total_value(&po_lines);
            let idempotence_key = Self::idempotence_key(supplier_id, &product_ids, actor, now);

            drafts.push(DraftPurchaseOrder {
                supplier_id,
                currency,
                exchange_rate,
                lines: po_lines,
                total_value,
                idempotence_key,
            });
        }
        drafts.sort_by_key(|d| d.supplier_id);
        drafts
    }

    /// `(supplier_id, sorted product ids, actor, minute bucket)`, hashed so repeated calls
    /// within the same wall-clock minute for the same input produce the same key and a
    /// bulk-assembly retry is a safe no-op (§9 open question resolution).
    pub fn idempotence_key(supplier_id: i64, sorted_product_ids: &[i64], actor: &str, now: NaiveDateTime) -> String {
        let minute_bucket = now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
        let mut hasher = Sha256::new();
        hasher.update(supplier_id.to_le_bytes());
        for id in sorted_product_ids {
            hasher.update(id.to_le_bytes());
        }
        hasher.update(actor.as_bytes());
        hasher.update(minute_bucket.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn draft_status() -> PurchaseOrderStatus {
        PurchaseOrderStatus::Draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(product_id: i64, quantity: i32, min: i32) -> InventoryItem {
        InventoryItem {
            id: product_id,
            product_id,
            warehouse_id: 1,
            quantity,
            reserved_quantity: 0,
            minimum_stock: min,
            reorder_point: 0,
            maximum_stock: None,
            manual_reorder_quantity: None,
        }
    }

    #[test]
    fn nets_against_pending_po_quantity() {
        let inv = vec![inventory(1, 5, 10)]; // raw reorder = 3*10-5 = 25
        let mut pending = HashMap::new();
        pending.insert(1, 20);
        let lines = ReorderEngine::compute_reorder_lines(&inv, &pending);
        assert_eq!(lines[0].quantity, 5);
    }

    #[test]
    fn fully_covered_by_pending_po_produces_no_line() {
        let inv = vec![inventory(1, 5, 10)];
        let mut pending = HashMap::new();
        pending.insert(1, 100);
        let lines = ReorderEngine::compute_reorder_lines(&inv, &pending);
        assert!(lines.is_empty());
    }

    #[test]
    fn groups_lines_by_cheapest_supplier_and_keeps_currency() {
        let lines = vec![ReorderLine { product_id: 1, quantity: 10 }, ReorderLine { product_id: 2, quantity: 4 }];
        let catalog = vec![
            SupplierCatalogEntry { supplier_id: 100, product_id: 1, unit_cost: Decimal::new(500, 2), currency: "CNY".into() },
            SupplierCatalogEntry { supplier_id: 200, product_id: 1, unit_cost: Decimal::new(600, 2), currency: "USD".into() },
            SupplierCatalogEntry { supplier_id: 100, product_id: 2, unit_cost: Decimal::new(100, 2), currency: "CNY".into() },
        ];
        let mut rates = HashMap::new();
        rates.insert("CNY".to_string(), Decimal::new(65, 2));

        let now = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc();
        let drafts = ReorderEngine::assemble_draft_pos(&lines, &catalog, &rates, "scheduler", now);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].supplier_id, 100);
        assert_eq!(drafts[0].currency, "CNY");
        assert_eq!(drafts[0].lines.len(), 2);
    }

    #[test]
    fn idempotence_key_is_stable_within_the_same_minute() {
        let now = chrono::DateTime::from_timestamp(1_700_000_030, 0).unwrap().naive_utc();
        let later_same_minute = chrono::DateTime::from_timestamp(1_700_000_059, 0).unwrap().naive_utc();
        let k1 = ReorderEngine::idempotence_key(1, &[1, 2, 3], "scheduler", now);
        let k2 = ReorderEngine::idempotence_key(1, &[1, 2, 3], "scheduler", later_same_minute);
        assert_eq!(k1, k2);
    }

    #[test]
    fn idempotence_key_changes_across_minute_boundary() {
        let now = chrono::DateTime::from_timestamp(1_700_000_030, 0).unwrap().naive_utc();
        let next_minute = chrono::DateTime::from_timestamp(1_700_000_090, 0).unwrap().naive_utc();
        let k1 = ReorderEngine::idempotence_key(1, &[1, 2, 3], "scheduler", now);
        let k2 = ReorderEngine::idempotence_key(1, &[1, 2, 3], "scheduler", next_minute);
        assert_ne!(k1, k2);
    }
}
