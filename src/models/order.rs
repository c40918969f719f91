//! Order status, a closed enumeration used when processing `order/read` and
//! `order/acknowledge` calls (§6.3, §6.4). Orders are not themselves a locally
//! persisted entity — no `orders` table is among the required tables (§6.2) — this
//! enum exists only to classify remote order payloads before acknowledging them.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Cancelled = 0,
    New = 1,
    InProgress = 2,
    Prepared = 3,
    Finalized = 4,
    Returned = 5,
}

impl OrderStatus {
    pub fn from_code(code: i16) -> Result<Self, AppError> {
        match code {
            0 => Ok(Self::Cancelled),
            1 => Ok(Self::New),
            2 => Ok(Self::InProgress),
            3 => Ok(Self::Prepared),
            4 => Ok(Self::Finalized),
            5 => Ok(Self::Returned),
            other => Err(AppError::new(ErrorKind::RemoteValidation, format!("unknown order status {other}"))),
        }
    }

    pub fn code(&self) -> i16 {
        *self as i16
    }

    /// Finalized and returned orders require acknowledgement; new/in-progress do not
    /// (§4.3's order sync only ever reads and flags, it never mutates remote state
    /// beyond the acknowledge call).
    pub fn requires_acknowledgement(&self) -> bool {
        matches!(self, Self::Finalized | Self::Returned)
    }
}
