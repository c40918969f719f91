//! §8.1 properties 6-7: manual reorder override precedence and PO line arithmetic/status.

use emag_sync_core::models::inventory::InventoryItem;
use emag_sync_core::models::purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn inventory(
    quantity: i32,
    reserved: i32,
    minimum_stock: i32,
    reorder_point: i32,
    maximum_stock: Option<i32>,
    manual_reorder_quantity: Option<i32>,
) -> InventoryItem {
    InventoryItem {
        id: 1,
        product_id: 1,
        warehouse_id: 1,
        quantity,
        reserved_quantity: reserved,
        minimum_stock,
        reorder_point,
        maximum_stock,
        manual_reorder_quantity,
    }
}

fn line(ordered: i32, received: i32) -> PurchaseOrderLine {
    PurchaseOrderLine { id: 1, purchase_order_id: 1, product_id: 1, ordered_qty: ordered, received_qty: received, unit_cost: Decimal::new(100, 0) }
}

proptest! {
    /// Property 6: whatever else is set on the item, a manual override always wins.
    #[test]
    fn manual_override_always_wins(
        quantity in 0i32..1000,
        reserved in 0i32..1000,
        minimum_stock in 0i32..1000,
        reorder_point in 0i32..1000,
        maximum_stock in prop::option::of(0i32..2000),
        manual in 0i32..5000,
    ) {
        let item = inventory(quantity, reserved, minimum_stock, reorder_point, maximum_stock, Some(manual));
        prop_assert_eq!(item.reorder_quantity(), manual);
    }

    /// Property 6 (negative space): with no manual override, the formula never goes negative.
    #[test]
    fn reorder_quantity_is_never_negative_without_override(
        quantity in 0i32..10_000,
        reserved in 0i32..10_000,
        minimum_stock in 0i32..1000,
        reorder_point in 0i32..1000,
        maximum_stock in prop::option::of(0i32..20_000),
    ) {
        let item = inventory(quantity, reserved, minimum_stock, reorder_point, maximum_stock, None);
        prop_assert!(item.reorder_quantity() >= 0);
    }

    /// Property 7: for any generated set of lines, a PO is `Received` iff every line is
    /// fully received, and never `Received` when at least one line has nothing at all.
    #[test]
    fn derive_status_received_iff_every_line_is_full(
        ordered_1 in 1i32..100, received_1 in 0i32..100,
        ordered_2 in 1i32..100, received_2 in 0i32..100,
    ) {
        let received_1 = received_1.min(ordered_1);
        let received_2 = received_2.min(ordered_2);
        let lines = vec![line(ordered_1, received_1), line(ordered_2, received_2)];

        let status = PurchaseOrder::derive_status(&lines, PurchaseOrderStatus::Sent);
        let all_full = lines.iter().all(|l| l.is_fully_received());
        let any_received = lines.iter().any(|l| l.received_qty > 0);

        if all_full {
            prop_assert_eq!(status, PurchaseOrderStatus::Received);
        } else if any_received {
            prop_assert_eq!(status, PurchaseOrderStatus::PartiallyReceived);
        } else {
            prop_assert_eq!(status, PurchaseOrderStatus::Sent);
        }
    }

    /// Property 7 (arithmetic): `validate_invariants` accepts every `received_qty` within
    /// `[0, ordered_qty]` and rejects everything outside it.
    #[test]
    fn line_invariant_accepts_exactly_the_closed_range(ordered in 0i32..1000, received in -500i32..1500) {
        let l = line(ordered, received);
        let in_range = (0..=ordered).contains(&received);
        prop_assert_eq!(l.validate_invariants().is_ok(), in_range);
    }

    /// Draft and cancelled statuses are terminal/frozen with respect to line state — they
    /// never get auto-promoted by `derive_status`.
    #[test]
    fn draft_and_cancelled_are_never_auto_promoted(
        ordered in 1i32..100, received in 0i32..100, is_cancelled in any::<bool>(),
    ) {
        let received = received.min(ordered);
        let lines = vec![line(ordered, received)];
        let current = if is_cancelled { PurchaseOrderStatus::Cancelled } else { PurchaseOrderStatus::Draft };
        prop_assert_eq!(PurchaseOrder::derive_status(&lines, current), current);
    }
}
