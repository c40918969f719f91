//! Purchase order, lines, and append-only history (§3.5).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    PartiallyReceived,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrderLine {
    pub id: i64,
    pub purchase_order_id: i64,
    pub product_id: i64,
    pub ordered_qty: i32,
    pub received_qty: i32,
    pub unit_cost: Decimal,
}

impl PurchaseOrderLine {
    pub fn validate_invariants(&self) -> Result<(), AppError> {
        if self.received_qty < 0 || self.received_qty > self.ordered_qty {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!(
                    "PO line {}: received_qty {} must be within [0, {}]",
                    self.id, self.received_qty, self.ordered_qty
                ),
            ));
        }
        Ok(())
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_qty == self.ordered_qty
    }

    pub fn is_partially_received(&self) -> bool {
        self.received_qty > 0 && self.received_qty < self.ordered_qty
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: i64,
    pub order_number: String,
    pub supplier_id: i64,
    pub status: PurchaseOrderStatus,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub total_value: Decimal,
    pub order_date: NaiveDateTime,
    pub expected_delivery: Option<NaiveDateTime>,
}

impl PurchaseOrder {
    /// §3.5 invariant: status is a pure function of the line receipt state.
    pub fn derive_status(lines: &[PurchaseOrderLine], current: PurchaseOrderStatus) -> PurchaseOrderStatus {
        if matches!(current, PurchaseOrderStatus::Cancelled | PurchaseOrderStatus::Draft) {
            return current;
        }
        if lines.is_empty() {
            return current;
        }
        if lines.iter().all(|l| l.is_fully_received()) {
            PurchaseOrderStatus::Received
        } else if lines.iter().any(|l| l.received_qty > 0) {
            PurchaseOrderStatus::PartiallyReceived
        } else {
            current
        }
    }

    pub fn compute_total_value(lines: &[PurchaseOrderLine]) -> Decimal {
        lines.iter().map(|l| Decimal::from(l.ordered_qty) * l.unit_cost).sum()
    }
}

/// Append-only audit trail for a purchase order (§3.6 ownership: cascades from the PO).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrderHistory {
    pub id: i64,
    pub purchase_order_id: i64,
    pub event: String,
    pub actor: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ordered: i32, received: i32) -> PurchaseOrderLine {
        PurchaseOrderLine {
            id: 1,
            purchase_order_id: 1,
            product_id: 1,
            ordered_qty: ordered,
            received_qty: received,
            unit_cost: Decimal::new(100, 0),
        }
    }

    #[test]
    fn status_received_iff_all_lines_full() {
        let lines = vec![line(10, 10), line(5, 5)];
        assert_eq!(
            PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Sent),
            PurchaseOrderStatus::Received
        );
    }

    #[test]
    fn status_partially_received_on_mixed_lines() {
        let lines = vec![line(10, 10), line(5, 0)];
        assert_eq!(
            PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Sent),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn status_partially_received_with_one_partial_line() {
        let lines = vec![line(10, 3)];
        assert_eq!(
            PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Sent),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn line_rejects_over_receipt() {
        let mut l = line(10, 11);
        l.received_qty = 11;
        assert!(l.validate_invariants().is_err());
    }

    #[test]
    fn total_value_is_sum_of_ordered_times_cost() {
        let lines = vec![line(10, 0), line(5, 0)];
        assert_eq!(PurchaseOrder::compute_total_value(&lines), Decimal::new(1500, 0));
    }
}
