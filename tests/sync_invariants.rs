//! §8.1 properties 2-4 and 8: sync-log monotonicity, terminal-state immutability,
//! conflict-strategy idempotence (via content hashing), and naive-timestamp persistence.

use chrono::NaiveDateTime;
use emag_sync_core::models::product::{Account, Product};
use emag_sync_core::models::sync_log::{Resource, SyncLog, SyncMode, SyncStatus};
use emag_sync_core::sync::persist::content_hash;
use proptest::prelude::*;

fn base_log(status: SyncStatus, processed: i64, created: i64, updated: i64, failed: i64, total: i64) -> SyncLog {
    SyncLog {
        id: 1,
        account: Account::Main,
        resource: Resource::Products,
        mode: SyncMode::Full,
        status,
        started_at: None,
        finished_at: None,
        total_items: Some(total),
        processed_items: processed,
        created_count: created,
        updated_count: updated,
        failed_count: failed,
        error_message: None,
        actor: "tester".into(),
        cancel_requested: false,
    }
}

fn product(stock: i32, sale_price_cents: i64, active: bool) -> Product {
    Product {
        id: 1,
        account: Account::Main,
        sku: "sku-1".into(),
        remote_id: Some(1),
        part_number_key: None,
        name: "Widget".into(),
        brand: None,
        category_id: None,
        eans: vec![],
        sale_price: Some(rust_decimal::Decimal::new(sale_price_cents, 2)),
        min_sale_price: None,
        max_sale_price: None,
        stock,
        validation_status: 9,
        offer_validation_status: Some(1),
        active,
        images: serde_json::Value::Null,
        characteristics: serde_json::Value::Null,
        chinese_name: None,
        content_hash: None,
        created_at: NaiveDateTime::default(),
        updated_at: NaiveDateTime::default(),
    }
}

proptest! {
    /// Property 2: any update that only adds to processed/created/updated/failed
    /// (without exceeding `total`) is accepted; any update that decreases one is rejected.
    #[test]
    fn monotonic_deltas_are_always_accepted(
        processed in 0i64..50,
        created in 0i64..50,
        updated in 0i64..50,
        failed in 0i64..50,
        d_processed in 0i64..10,
        d_created in 0i64..10,
        d_updated in 0i64..10,
        d_failed in 0i64..10,
    ) {
        let total = processed + 1000; // plenty of headroom
        let current = base_log(SyncStatus::Running, processed, created, updated, failed, total);
        let mut next = current.clone();
        next.processed_items += d_processed;
        next.created_count += d_created;
        next.updated_count += d_updated;
        next.failed_count += d_failed;

        prop_assert!(current.validate_monotonic_update(&next).is_ok());
    }

    /// Property 2 (negative case): any single regressing field is rejected regardless
    /// of what the other three fields do.
    #[test]
    fn any_regression_is_rejected(
        processed in 1i64..50,
        created in 1i64..50,
        updated in 1i64..50,
        failed in 1i64..50,
        which in 0u8..4,
    ) {
        let total = processed + 1000;
        let current = base_log(SyncStatus::Running, processed, created, updated, failed, total);
        let mut next = current.clone();
        match which {
            0 => next.processed_items -= 1,
            1 => next.created_count -= 1,
            2 => next.updated_count -= 1,
            _ => next.failed_count -= 1,
        }
        prop_assert!(current.validate_monotonic_update(&next).is_err());
    }

    /// Property 3: once a log row is terminal, no further mutation of any kind is permitted.
    #[test]
    fn terminal_rows_reject_every_update(
        processed in 0i64..50,
        created in 0i64..50,
        updated in 0i64..50,
        failed in 0i64..50,
        status_idx in 0u8..3,
    ) {
        let status = match status_idx {
            0 => SyncStatus::Succeeded,
            1 => SyncStatus::Failed,
            _ => SyncStatus::Cancelled,
        };
        let current = base_log(status, processed, created, updated, failed, processed + 100);
        let mut next = current.clone();
        next.processed_items += 1;
        prop_assert!(current.validate_monotonic_update(&next).is_err());
    }

    /// Property 4 (idempotence, narrowed to the hash it's built on): `content_hash` is a
    /// pure function of the fields that matter for change detection, so applying the same
    /// remote record twice always hashes identically regardless of unrelated field churn
    /// (id, timestamps, remote_id) between the two applications.
    #[test]
    fn content_hash_ignores_fields_outside_its_contract(
        stock in 0i32..10_000,
        price_cents in 0i64..100_000,
        active in any::<bool>(),
        id_a in 1i64..1000,
        id_b in 1000i64..2000,
    ) {
        let mut a = product(stock, price_cents, active);
        let mut b = product(stock, price_cents, active);
        a.id = id_a;
        b.id = id_b;
        b.remote_id = Some(999);
        b.created_at = NaiveDateTime::default();

        prop_assert_eq!(content_hash(&a), content_hash(&b));
    }

    /// Property 8: a `NaiveDateTime` carries no offset information by construction, so
    /// constructing one from arbitrary epoch seconds and round-tripping it through the
    /// types this crate persists can never smuggle in a timezone.
    #[test]
    fn naive_datetimes_never_carry_a_timezone(epoch_secs in 0i64..2_000_000_000) {
        let naive = chrono::DateTime::from_timestamp(epoch_secs, 0).unwrap().naive_utc();
        let mut log = base_log(SyncStatus::Running, 0, 0, 0, 0, 100);
        log.started_at = Some(naive);
        // `NaiveDateTime`'s Display never includes a `+`/`Z` offset marker.
        prop_assert!(!log.started_at.unwrap().to_string().contains('+'));
        prop_assert!(!log.started_at.unwrap().to_string().contains('Z'));
    }
}
