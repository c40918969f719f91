//! Matching/deduplication engine (C5, §4.5): links supplier catalog rows to local
//! products. Pipeline order is exact EAN, then exact part-number-key, then Jaccard
//! fuzzy name similarity. Grounded on the teacher's `MatchingEngine` (order-book
//! matching) only in the sense of "engine holds no DB handle, operates on in-memory
//! candidates passed in by the caller" — the matching logic itself is new.

pub mod similarity;

use crate::models::product::Product;
use crate::models::supplier_product::SupplierProduct;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Ean,
    PartNumberKey,
    Fuzzy,
}

#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub product_id: i64,
    pub method: MatchMethod,
    pub score: f64,
}

pub struct MatchingEngine {
    similarity_threshold: f64,
}

impl MatchingEngine {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    /// Digit runs of 8-14 characters, extracted from free text. Deliberately not
    /// GS1-checksum-filtered: `Product.eans` is stored verbatim from the remote
    /// catalog (§3.1 only rejects duplicates, not bad checksums), so a checksum
    /// filter here would make a text-mined candidate unmatchable against a real
    /// product whose own EAN happens to fail the checksum.
    fn extract_eans(text: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut current = String::new();
        let mut flush = |current: &mut String, found: &mut Vec<String>| {
            if (8..=14).contains(&current.len()) {
                found.push(current.clone());
            }
            current.clear();
        };
        for c in text.chars() {
            if c.is_ascii_digit() {
                current.push(c);
            } else {
                flush(&mut current, &mut found);
            }
        }
        flush(&mut current, &mut found);
        found
    }

    /// Runs the full pipeline for one supplier row against the candidate product set,
    /// returning the best match found (if any clears the threshold).
    pub fn find_match(&self, supplier: &SupplierProduct, candidates: &[Product]) -> Option<MatchCandidate> {
        let eans_in_name = Self::extract_eans(&supplier.raw_name);
        for ean in &eans_in_name {
            if let Some(product) = candidates.iter().find(|p| p.eans.iter().any(|e| e == ean)) {
                return Some(MatchCandidate { product_id: product.id, method: MatchMethod::Ean, score: 1.0 });
            }
        }

        for word in supplier.raw_name.split_whitespace() {
            if let Some(product) = candidates
                .iter()
                .find(|p| p.part_number_key.as_deref() == Some(word))
            {
                return Some(MatchCandidate {
                    product_id: product.id,
                    method: MatchMethod::PartNumberKey,
                    score: 1.0,
                });
            }
        }

        candidates
            .iter()
            .filter_map(|p| {
                let name = p.chinese_name.as_deref().unwrap_or(&p.name);
                let score = similarity::scored_similarity(&supplier.raw_name, name);
                (score >= self.similarity_threshold).then_some(MatchCandidate {
                    product_id: p.id,
                    method: MatchMethod::Fuzzy,
                    score,
                })
            })
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Re-runs the pipeline over every unconfirmed row, leaving confirmed matches
    /// untouched (§4.5 "confirmed matches survive re-match-all").
    pub fn rematch_all(&self, supplier_products: &mut [SupplierProduct], candidates: &[Product]) {
        for sp in supplier_products.iter_mut() {
            if sp.match_state() == crate::models::supplier_product::MatchState::Confirmed {
                continue;
            }
            if let Some(candidate) = self.find_match(sp, candidates) {
                // apply_auto_match only errors on an already-confirmed row, which we skip above.
                let _ = sp.apply_auto_match(candidate.product_id, candidate.score);
            } else {
                sp.unmatch();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;

    fn product(id: i64, name: &str, eans: Vec<&str>, pnk: Option<&str>) -> Product {
        Product {
            id,
            account: crate::models::product::Account::Main,
            sku: format!("sku-{id}"),
            remote_id: None,
            part_number_key: pnk.map(|s| s.to_string()),
            name: name.to_string(),
            brand: None,
            category_id: None,
            eans: eans.into_iter().map(|s| s.to_string()).collect(),
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

    fn supplier(id: i64, raw_name: &str) -> SupplierProduct {
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

    #[test]
    fn ean_match_does_not_require_a_valid_gs1_checksum() {
        // "5941234567890" fails the GS1 checksum (see models::product's own test), but
        // it's what the remote catalog actually stored for this product, so it must
        // still be matchable from the supplier's free-text listing.
        let engine = MatchingEngine::new(0.8);
        let candidates = vec![product(1, "Wireless Keyboard", vec!["5941234567890"], None)];
        let sp = supplier(1, "Keyboard EAN 5941234567890 black");
        let m = engine.find_match(&sp, &candidates).unwrap();
        assert_eq!(m.method, MatchMethod::Ean);
        assert_eq!(m.product_id, 1);
    }

    #[test]
    fn exact_ean_in_free_text_wins_over_fuzzy() {
        let engine = MatchingEngine::new(0.8);
        let candidates = vec![product(1, "Wireless Keyboard", vec!["5941234567899"], None)];
        let sp = supplier(1, "Keyboard EAN 5941234567899 black");
        let m = engine.find_match(&sp, &candidates).unwrap();
        assert_eq!(m.method, MatchMethod::Ean);
        assert_eq!(m.product_id, 1);
    }

    #[test]
    fn part_number_key_token_match() {
        let engine = MatchingEngine::new(0.8);
        let candidates = vec![product(1, "Wireless Mouse", vec![], Some("D1234"))];
        let sp = supplier(1, "Mouse model D1234 wireless");
        let m = engine.find_match(&sp, &candidates).unwrap();
        assert_eq!(m.method, MatchMethod::PartNumberKey);
    }

    #[test]
    fn falls_back_to_fuzzy_match_above_threshold() {
        let engine = MatchingEngine::new(0.3);
        let mut p = product(1, "Mechanical Keyboard RGB", vec![], None);
        p.chinese_name = Some("机械键盘RGB背光".into());
        let candidates = vec![p];
        let sp = supplier(1, "机械键盘RGB灯光");
        let m = engine.find_match(&sp, &candidates).unwrap();
        assert_eq!(m.method, MatchMethod::Fuzzy);
    }

    #[test]
    fn no_match_below_threshold() {
        let engine = MatchingEngine::new(0.9);
        let candidates = vec![product(1, "Totally unrelated item", vec![], None)];
        let sp = supplier(1, "完全不同的东西");
        assert!(engine.find_match(&sp, &candidates).is_none());
    }

    #[test]
    fn rematch_all_preserves_confirmed_rows() {
        let engine = MatchingEngine::new(0.3);
        let mut p = product(1, "Mechanical Keyboard", vec![], None);
        p.chinese_name = Some("机械键盘".into());
        let candidates = vec![p];

        let mut sp = supplier(1, "某个完全不同的物品");
        sp.linked_local_product_id = Some(99);
        sp.manual_confirmed = Some(true);
        sp.confirmed_by = Some("operator".into());
        sp.confirmed_at = Some(NaiveDateTime::default());

        let mut rows = vec![sp];
        engine.rematch_all(&mut rows, &candidates);
        assert_eq!(rows[0].linked_local_product_id, Some(99));
        assert_eq!(rows[0].manual_confirmed, Some(true));
    }
}
