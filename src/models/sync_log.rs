//! Durable sync audit/state row (§3.2) and the closed enumerations that key it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::product::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Products,
    Offers,
    Orders,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Offers => "offers",
            Resource::Orders => "orders",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
    Selective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    EmagPriority,
    LocalPriority,
    NewestWins,
    Manual,
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        ConflictStrategy::EmagPriority
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SyncStatus {
    /// Terminal states are write-once (§3.2, property test 3).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Succeeded | SyncStatus::Failed | SyncStatus::Cancelled)
    }
}

/// One row per submitted sync; never deleted (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLog {
    pub id: i64,
    pub account: Account,
    pub resource: Resource,
    pub mode: SyncMode,
    pub status: SyncStatus,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub total_items: Option<i64>,
    pub processed_items: i64,
    pub created_count: i64,
    pub updated_count: i64,
    pub failed_count: i64,
    pub error_message: Option<String>,
    pub actor: String,
    pub cancel_requested: bool,
}

impl SyncLog {
    /// §8.1 property 2: processed/created/updated/failed non-decreasing; processed <= total once set.
    pub fn validate_monotonic_update(&self, next: &SyncLog) -> Result<(), String> {
        if next.processed_items < self.processed_items {
            return Err(format!(
                "processed_items regressed: {} -> {}",
                self.processed_items, next.processed_items
            ));
        }
        if next.created_count < self.created_count {
            return Err("created_count regressed".into());
        }
        if next.updated_count < self.updated_count {
            return Err("updated_count regressed".into());
        }
        if next.failed_count < self.failed_count {
            return Err("failed_count regressed".into());
        }
        if let Some(total) = next.total_items {
            if next.processed_items > total {
                return Err(format!("processed_items {} exceeds total {total}", next.processed_items));
            }
        }
        if self.status.is_terminal() {
            return Err(format!("sync log {} is already terminal ({:?})", self.id, self.status));
        }
        Ok(())
    }
}

/// Live, in-memory progress snapshot published alongside the durable log (§4.3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub sync_log_id: i64,
    pub account: Account,
    pub resource: Resource,
    pub current_page: u32,
    pub processed: i64,
    pub total: Option<i64>,
    pub items_per_second: f64,
    pub eta_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(status: SyncStatus) -> SyncLog {
        SyncLog {
            id: 1,
            account: Account::Main,
            resource: Resource::Products,
            mode: SyncMode::Full,
            status,
            started_at: None,
            finished_at: None,
            total_items: Some(100),
            processed_items: 10,
            created_count: 5,
            updated_count: 5,
            failed_count: 0,
            error_message: None,
            actor: "tester".into(),
            cancel_requested: false,
        }
    }

    #[test]
    fn rejects_regression() {
        let log = base(SyncStatus::Running);
        let mut next = base(SyncStatus::Running);
        next.processed_items = 5;
        assert!(log.validate_monotonic_update(&next).is_err());
    }

    #[test]
    fn rejects_processed_over_total() {
        let log = base(SyncStatus::Running);
        let mut next = base(SyncStatus::Running);
        next.processed_items = 200;
        assert!(log.validate_monotonic_update(&next).is_err());
    }

    #[test]
    fn rejects_mutation_after_terminal() {
        let log = base(SyncStatus::Succeeded);
        let next = base(SyncStatus::Succeeded);
        assert!(log.validate_monotonic_update(&next).is_err());
    }

    #[test]
    fn accepts_monotonic_progress() {
        let log = base(SyncStatus::Running);
        let mut next = base(SyncStatus::Running);
        next.processed_items = 20;
        next.created_count = 10;
        assert!(log.validate_monotonic_update(&next).is_ok());
    }
}
