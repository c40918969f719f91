//! Inventory item and the auto-reorder formula (§3.4, §4.6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub minimum_stock: i32,
    pub reorder_point: i32,
    pub maximum_stock: Option<i32>,
    pub manual_reorder_quantity: Option<i32>,
}

impl InventoryItem {
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }

    /// §4.6 auto reorder formula, manual override taking precedence (§8.1 property 6).
    pub fn reorder_quantity(&self) -> i32 {
        if let Some(manual) = self.manual_reorder_quantity {
            return manual;
        }
        let available = self.available();
        if let Some(max) = self.maximum_stock {
            return (max - available).max(0);
        }
        if self.reorder_point > 0 {
            return (2 * self.reorder_point - available).max(0);
        }
        (3 * self.minimum_stock - available).max(0)
    }
}
