//! Catalog entity and the enumerations carried through the sync core (§3.1, §6.3).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::{AppError, ErrorKind};

/// The two independently credentialed seller contexts (§GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Account {
    Main,
    Fbe,
}

impl Account {
    pub fn as_str(&self) -> &'static str {
        match self {
            Account::Main => "main",
            Account::Fbe => "fbe",
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Account {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(Account::Main),
            "fbe" => Ok(Account::Fbe),
            other => Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("unknown account '{other}', expected 'main' or 'fbe'"),
            )),
        }
    }
}

/// Validation status: an integer 0..17. Of these, {9, 11, 12, 17} are "saleable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus(i16);

const SALEABLE_VALIDATION_STATUSES: [i16; 4] = [9, 11, 12, 17];

impl ValidationStatus {
    pub fn new(code: i16) -> Result<Self, AppError> {
        if (0..=17).contains(&code) {
            Ok(Self(code))
        } else {
            Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("validation_status {code} out of range 0..17"),
            ))
        }
    }

    pub fn code(&self) -> i16 {
        self.0
    }

    pub fn is_saleable(&self) -> bool {
        SALEABLE_VALIDATION_STATUSES.contains(&self.0)
    }
}

/// Offer validation status: {1 = valid (saleable), 2 = invalid price}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OfferValidationStatus {
    Valid = 1,
    InvalidPrice = 2,
}

impl OfferValidationStatus {
    pub fn from_code(code: i16) -> Result<Self, AppError> {
        match code {
            1 => Ok(Self::Valid),
            2 => Ok(Self::InvalidPrice),
            other => Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("unknown offer_validation_status {other}"),
            )),
        }
    }

    pub fn is_saleable(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// An 8-14 digit EAN/UPC article barcode, checksum-validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ean(String);

impl Ean {
    pub fn new(raw: &str) -> Result<Self, AppError> {
        let digits: Vec<u32> = raw
            .chars()
            .map(|c| c.to_digit(10))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AppError::new(ErrorKind::RemoteValidation, format!("EAN '{raw}' is not numeric")))?;

        if !(8..=14).contains(&digits.len()) {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("EAN '{raw}' must be 8-14 digits, got {}", digits.len()),
            ));
        }

        let (data, check_digit) = digits.split_at(digits.len() - 1);
        let expected = gs1_check_digit(data);
        if expected != check_digit[0] {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("EAN '{raw}' failed checksum (expected check digit {expected})"),
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// GS1 mod-10 check digit: weight 3/1 alternating from the rightmost data digit.
fn gs1_check_digit(data_digits: &[u32]) -> u32 {
    let sum: u32 = data_digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - (sum % 10)) % 10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCharacteristic {
    pub id: i64,
    pub value: String,
    pub tag: Option<String>,
}

/// The catalog entity (§3.1). Never hard-deleted; soft-deactivated via `active`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub account: Account,
    pub sku: String,
    pub remote_id: Option<i64>,
    pub part_number_key: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub category_id: Option<i64>,
    pub eans: Vec<String>,
    pub sale_price: Option<Decimal>,
    pub min_sale_price: Option<Decimal>,
    pub max_sale_price: Option<Decimal>,
    pub stock: i32,
    pub validation_status: i16,
    pub offer_validation_status: Option<i16>,
    pub active: bool,
    pub images: serde_json::Value,
    pub characteristics: serde_json::Value,
    pub chinese_name: Option<String>,
    /// Hash of the remote record's significant fields, used to skip no-op upserts (§4.3 idempotence).
    pub content_hash: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Product {
    /// Validates the cross-field invariants from §3.1. Called before every write.
    pub fn validate_invariants(&self) -> Result<(), AppError> {
        if let (Some(min), Some(sale), Some(max)) = (self.min_sale_price, self.sale_price, self.max_sale_price) {
            if !(min <= sale && sale <= max) {
                return Err(AppError::new(
                    ErrorKind::RemoteValidation,
                    format!(
                        "product {}: min_sale_price {min} <= sale_price {sale} <= max_sale_price {max} violated",
                        self.sku
                    ),
                ));
            }
        }

        if self.stock < 0 {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!("product {}: stock {} must be non-negative", self.sku, self.stock),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for ean in &self.eans {
            if !seen.insert(ean.as_str()) {
                return Err(AppError::new(
                    ErrorKind::RemoteValidation,
                    format!("product {}: duplicate EAN {ean}", self.sku),
                ));
            }
        }

        if self.part_number_key.is_none() && self.eans.is_empty() && self.remote_id.is_some() {
            return Err(AppError::new(
                ErrorKind::RemoteValidation,
                format!(
                    "product {}: attaching an offer requires a part_number_key or an EAN",
                    self.sku
                ),
            ));
        }

        Ok(())
    }

    /// Saleable iff offer is valid, validation status is one of the saleable codes, active, and in stock.
    pub fn is_saleable(&self) -> bool {
        self.active
            && self.stock > 0
            && self.offer_validation_status == Some(1)
            && SALEABLE_VALIDATION_STATUSES.contains(&self.validation_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ean_checksum_valid() {
        // GS1 check digit over "594123456789" is 9.
        assert!(Ean::new("5941234567899").is_ok());
    }

    #[test]
    fn ean_checksum_rejects_bad_digit() {
        assert!(Ean::new("5941234567890").is_err());
    }

    #[test]
    fn ean_rejects_wrong_length() {
        assert!(Ean::new("123").is_err());
    }

    #[test]
    fn validation_status_saleable_set() {
        assert!(ValidationStatus::new(9).unwrap().is_saleable());
        assert!(ValidationStatus::new(11).unwrap().is_saleable());
        assert!(ValidationStatus::new(12).unwrap().is_saleable());
        assert!(ValidationStatus::new(17).unwrap().is_saleable());
        assert!(!ValidationStatus::new(0).unwrap().is_saleable());
        assert!(ValidationStatus::new(18).is_err());
    }

    #[test]
    fn account_round_trips_through_str() {
        use std::str::FromStr;
        assert_eq!(Account::from_str("MAIN").unwrap(), Account::Main);
        assert_eq!(Account::from_str("fbe").unwrap(), Account::Fbe);
        assert!(Account::from_str("other").is_err());
    }
}
