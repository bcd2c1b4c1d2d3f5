//! Transfer Core Types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::state::TransferStatus;
use crate::identity::UserId;

/// Transfer identifier - random UUID v4, stored as PostgreSQL UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID value
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Settlement failure reported by the settlement service.
///
/// Open-ended: anything not recognized is carried verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InsufficientFunds,
    RecipientUnresolvable,
    Rejected,
    Timeout,
    Other(String),
}

impl FailureReason {
    pub fn as_code(&self) -> String {
        match self {
            FailureReason::InsufficientFunds => "insufficient_funds".to_string(),
            FailureReason::RecipientUnresolvable => "recipient_unresolvable".to_string(),
            FailureReason::Rejected => "rejected".to_string(),
            FailureReason::Timeout => "timeout".to_string(),
            FailureReason::Other(text) => format!("other:{}", text),
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "insufficient_funds" => FailureReason::InsufficientFunds,
            "recipient_unresolvable" => FailureReason::RecipientUnresolvable,
            "rejected" => FailureReason::Rejected,
            "timeout" => FailureReason::Timeout,
            other => FailureReason::Other(other.strip_prefix("other:").unwrap_or(other).to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Persisted transfer record
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub transfer_id: TransferId,
    pub sender_id: Option<UserId>,
    pub recipient_id: Option<UserId>,
    pub recipient_handle: String,
    pub amount: Decimal,
    pub currency: String,
    pub fee_amount: Decimal,
    pub status: TransferStatus,
    pub is_test_transfer: bool,
    pub cancellable_until: Option<DateTime<Utc>>,
    pub transaction_ref: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Sender or recipient of this transfer
    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender_id == Some(user_id) || self.recipient_id == Some(user_id)
    }
}

/// Validated input for [`TransferStore::create`](super::store::TransferStore::create).
///
/// Produced by the transfer service after amount, currency and recipient
/// checks; the fee and deadline are already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransfer {
    pub transfer_id: TransferId,
    pub sender_id: Option<UserId>,
    pub recipient_id: Option<UserId>,
    pub recipient_handle: String,
    pub amount: Decimal,
    pub currency: String,
    pub fee_amount: Decimal,
    pub is_test_transfer: bool,
    pub cancellable_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewTransfer {
    /// The record as it is first persisted: PENDING, nothing settled.
    pub fn into_pending(self) -> Transfer {
        Transfer {
            transfer_id: self.transfer_id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            recipient_handle: self.recipient_handle,
            amount: self.amount,
            currency: self.currency,
            fee_amount: self.fee_amount,
            status: TransferStatus::Pending,
            is_test_transfer: self.is_test_transfer,
            cancellable_until: self.cancellable_until,
            transaction_ref: None,
            failure_reason: None,
            created_at: self.created_at,
            completed_at: None,
        }
    }
}

/// Amount bounds, supported currencies and the test-transfer window.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferLimits {
    pub min: Decimal,
    pub max: Decimal,
    pub test_min: Decimal,
    pub test_max: Decimal,
    pub cancel_window: Duration,
    pub supported_currencies: Vec<String>,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min: Decimal::ONE,
            max: Decimal::from(10_000),
            test_min: Decimal::ONE,
            test_max: Decimal::from(5),
            cancel_window: Duration::minutes(5),
            supported_currencies: vec!["USDC".to_string(), "ETH".to_string(), "DAI".to_string()],
        }
    }
}

impl TransferLimits {
    /// Inclusive amount bounds for the kind of transfer
    pub fn bounds(&self, is_test: bool) -> (Decimal, Decimal) {
        if is_test {
            (self.test_min, self.test_max)
        } else {
            (self.min, self.max)
        }
    }

    pub fn supports(&self, currency: &str) -> bool {
        self.supported_currencies.iter().any(|c| c == currency)
    }
}

/// Limit/offset pagination for transfer listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page, clamping the limit to `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Normalize a recipient handle: trim, drop a leading `@`, lowercase.
///
/// Returns `None` when nothing usable is left.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim();
    let handle = handle.strip_prefix('@').unwrap_or(handle).trim();
    if handle.is_empty() || handle.chars().any(char::is_whitespace) {
        return None;
    }
    Some(handle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_id_parse_roundtrip() {
        let id = TransferId::new();
        let parsed: TransferId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<TransferId>().is_err());
    }

    #[test]
    fn test_failure_reason_codes() {
        assert_eq!(FailureReason::Timeout.as_code(), "timeout");
        assert_eq!(
            FailureReason::from_code("insufficient_funds"),
            FailureReason::InsufficientFunds
        );
        assert_eq!(
            FailureReason::from_code("nonce too low"),
            FailureReason::Other("nonce too low".to_string())
        );
        let other = FailureReason::Other("gas".to_string());
        assert_eq!(FailureReason::from_code(&other.as_code()), other);
    }

    #[test]
    fn test_limits_bounds() {
        let limits = TransferLimits::default();
        assert_eq!(limits.bounds(false), (Decimal::ONE, Decimal::from(10_000)));
        assert_eq!(limits.bounds(true), (Decimal::ONE, Decimal::from(5)));
        assert!(limits.supports("USDC"));
        assert!(!limits.supports("usdc"));
        assert!(!limits.supports("BTC"));
    }

    #[test]
    fn test_page_clamps_limit() {
        assert_eq!(Page::default(), Page { limit: 50, offset: 0 });
        assert_eq!(Page::new(Some(0), Some(10)).limit, 1);
        assert_eq!(Page::new(Some(1_000), None).limit, 100);
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@Alice_01 "), Some("alice_01".to_string()));
        assert_eq!(normalize_handle("bob"), Some("bob".to_string()));
        assert_eq!(normalize_handle("   "), None);
        assert_eq!(normalize_handle("@"), None);
        assert_eq!(normalize_handle("two words"), None);
    }
}
