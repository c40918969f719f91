//! Supplier-side catalog entry and the pending/confirmed match state machine (§3.3, §4.5).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, ErrorKind};

/// Tri-state match status: `Unmatched` (never-matched or unlinked), `Pending` (auto-matched,
/// awaiting confirmation), `Confirmed` (human-approved). Mirrors `manual_confirmed`'s
/// null/false/true tri-state from §3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    Unmatched,
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierProduct {
    pub id: i64,
    pub supplier_id: i64,
    pub raw_name: String,
    pub normalized_tokens: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub url: Option<String>,
    pub linked_local_product_id: Option<i64>,
    pub similarity_score: Option<f64>,
    pub manual_confirmed: Option<bool>,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<NaiveDateTime>,
}

impl SupplierProduct {
    pub fn match_state(&self) -> MatchState {
        match (self.linked_local_product_id, self.manual_confirmed) {
            (None, _) => MatchState::Unmatched,
            (Some(_), Some(true)) => MatchState::Confirmed,
            (Some(_), Some(false)) => MatchState::Pending,
            (Some(_), None) => MatchState::Unmatched,
        }
    }

    /// §3.3 invariant: when unlinked, the three companion fields must also be null.
    pub fn validate_invariants(&self) -> Result<(), AppError> {
        if self.linked_local_product_id.is_none()
            && (self.manual_confirmed.is_some() || self.similarity_score.is_some())
        {
            return Err(AppError::new(
                ErrorKind::ConflictExists,
                format!(
                    "supplier product {}: manual_confirmed/similarity_score must be null when unlinked",
                    self.id
                ),
            ));
        }
        Ok(())
    }

    /// Auto-match assigns a pending link; never overwrites a confirmed match.
    pub fn apply_auto_match(&mut self, local_product_id: i64, score: f64) -> Result<(), AppError> {
        if self.match_state() == MatchState::Confirmed {
            return Err(AppError::new(
                ErrorKind::ConflictExists,
                format!("supplier product {} is already confirmed, refusing auto-match overwrite", self.id),
            ));
        }
        self.linked_local_product_id = Some(local_product_id);
        self.similarity_score = Some(score);
        self.manual_confirmed = Some(false);
        self.confirmed_by = None;
        self.confirmed_at = None;
        Ok(())
    }

    /// Human confirmation: pending -> confirmed.
    pub fn confirm(&mut self, confirmed_by: &str, now: NaiveDateTime) -> Result<(), AppError> {
        if self.linked_local_product_id.is_none() {
            return Err(AppError::new(
                ErrorKind::ConflictExists,
                format!("cannot confirm supplier product {} with no pending link", self.id),
            ));
        }
        self.manual_confirmed = Some(true);
        self.confirmed_by = Some(confirmed_by.to_string());
        self.confirmed_at = Some(now);
        Ok(())
    }

    /// Unmatch: any state -> unmatched, nullifying all companion fields atomically.
    pub fn unmatch(&mut self) {
        self.linked_local_product_id = None;
        self.similarity_score = None;
        self.manual_confirmed = None;
        self.confirmed_by = None;
        self.confirmed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc()
    }

    fn fresh() -> SupplierProduct {
        SupplierProduct {
            id: 1,
            supplier_id: 10,
            raw_name: "单片机键盘".into(),
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
    fn fresh_is_unmatched() {
        assert_eq!(fresh().match_state(), MatchState::Unmatched);
    }

    #[test]
    fn auto_match_then_confirm_round_trip() {
        let mut sp = fresh();
        sp.apply_auto_match(42, 0.91).unwrap();
        assert_eq!(sp.match_state(), MatchState::Pending);

        sp.confirm("operator", now()).unwrap();
        assert_eq!(sp.match_state(), MatchState::Confirmed);

        // unmatch leaves no residue (§8.2 match/unmatch round trip)
        sp.unmatch();
        assert_eq!(sp.match_state(), MatchState::Unmatched);
        assert!(sp.similarity_score.is_none());
        assert!(sp.manual_confirmed.is_none());
        assert!(sp.confirmed_by.is_none());
    }

    #[test]
    fn confirmed_match_cannot_be_overwritten_by_auto_match() {
        let mut sp = fresh();
        sp.apply_auto_match(42, 0.91).unwrap();
        sp.confirm("operator", now()).unwrap();
        assert!(sp.apply_auto_match(99, 0.95).is_err());
    }
}
