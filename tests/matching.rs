//! §8.1 property 5: match preservation. Re-running the matching pipeline over a batch
//! never disturbs a row that a human has already confirmed.

use chrono::NaiveDateTime;
use emag_sync_core::matching::MatchingEngine;
use emag_sync_core::models::product::{Account, Product};
use emag_sync_core::models::supplier_product::{MatchState, SupplierProduct};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn product(id: i64, name: &str) -> Product {
    Product {
        id,
        account: Account::Main,
        sku: format!("sku-{id}"),
        remote_id: None,
        part_number_key: None,
        name: name.to_string(),
        brand: None,
        category_id: None,
        eans: vec![],
        sale_price: None,
        min_sale_price: None,
        max_sale_price: None,
        stock: 0,
        validation_status: 0,
        offer_validation_status: None,
        active: true,
        images: serde_json::Value::Null,
        characteristics: serde_json::Value::Null,
        chinese_name: None,
        content_hash: None,
        created_at: NaiveDateTime::default(),
        updated_at: NaiveDateTime::default(),
    }
}

fn confirmed_supplier(id: i64, raw_name: &str, linked_product_id: i64) -> SupplierProduct {
    SupplierProduct {
        id,
        supplier_id: 10,
        raw_name: raw_name.to_string(),
        normalized_tokens: None,
        image_url: None,
        price: Decimal::new(100, 2),
        url: None,
        linked_local_product_id: Some(linked_product_id),
        similarity_score: Some(0.95),
        manual_confirmed: Some(true),
        confirmed_by: Some("operator".into()),
        confirmed_at: Some(NaiveDateTime::default()),
    }
}

fn pending_supplier(id: i64, raw_name: &str) -> SupplierProduct {
    SupplierProduct {
        id,
        supplier_id: 10,
        raw_name: raw_name.to_string(),
        normalized_tokens: None,
        image_url: None,
        price: Decimal::new(100, 2),
        url: None,
        linked_local_product_id: None,
        similarity_score: None,
        manual_confirmed: None,
        confirmed_by: None,
        confirmed_at: None,
    }
}

proptest! {
    /// No matter what the candidate set or the other rows in the batch look like, a
    /// confirmed row's link, score, and confirmation metadata survive `rematch_all`
    /// byte-for-byte.
    #[test]
    fn rematch_all_never_touches_a_confirmed_row(
        confirmed_product_id in 1i64..50,
        num_other_candidates in 0usize..5,
        num_pending_rows in 0usize..5,
        raw_name in "[a-zA-Z ]{0,20}",
    ) {
        let engine = MatchingEngine::new(0.8);

        let mut candidates: Vec<Product> = (0..num_other_candidates)
            .map(|i| product(1000 + i as i64, "Unrelated Candidate"))
            .collect();
        candidates.push(product(confirmed_product_id, "Whatever Was Originally Matched"));

        let confirmed = confirmed_supplier(1, &raw_name, confirmed_product_id);
        let before = confirmed.clone();

        let mut rows = vec![confirmed];
        rows.extend((0..num_pending_rows).map(|i| pending_supplier(100 + i as i64, &raw_name)));

        engine.rematch_all(&mut rows, &candidates);

        let after = rows.iter().find(|sp| sp.id == 1).unwrap();
        prop_assert_eq!(after.linked_local_product_id, before.linked_local_product_id);
        prop_assert_eq!(after.similarity_score, before.similarity_score);
        prop_assert_eq!(after.manual_confirmed, before.manual_confirmed);
        prop_assert_eq!(&after.confirmed_by, &before.confirmed_by);
        prop_assert_eq!(after.confirmed_at, before.confirmed_at);
        prop_assert_eq!(after.match_state(), MatchState::Confirmed);
    }
}
