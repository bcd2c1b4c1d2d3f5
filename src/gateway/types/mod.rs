//! Gateway types module
//!
//! ## Input Types
//! - [`StrictDecimal`]: Format-validated decimal for API input
//! - [`CreateTransferRequest`], [`ListTransfersQuery`], settlement callbacks
//! - [`CreateWithdrawalRequest`], payout status reports
//! - [`ApiJson`], [`ApiQuery`]: extractors that reject with [`ApiError`]
//!
//! ## Output Types
//! - [`TransferView`]: camelCase transfer with string amounts
//! - [`WithdrawalView`]: withdrawal without its bank account
//! - [`response`]: success envelopes, [`ApiError`] and error codes

pub mod extract;
pub mod money;
pub mod response;
pub mod withdrawal;

pub use extract::{ApiJson, ApiQuery};
pub use money::{StrictDecimal, decimal_string};
pub use response::{
    ApiError, ErrorResponse, TransferListResponse, TransferResponse, WithdrawalListResponse,
    WithdrawalResponse, error_codes,
};
pub use withdrawal::{
    CreateWithdrawalRequest, ListWithdrawalsQuery, WithdrawalStatusRequest, WithdrawalView,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::transfer::{CreateTransfer, FailureReason, Transfer};

/// Transfer as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    #[schema(example = "7f1c2a7e-9b0e-4f7a-9a53-2b8c1f0d5e11")]
    pub transfer_id: String,
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    #[schema(example = "bob")]
    pub recipient_handle: String,
    #[schema(example = "3")]
    pub amount: String,
    #[schema(example = "USDC")]
    pub currency: String,
    #[schema(example = "0.015")]
    pub fee_amount: String,
    #[schema(example = "pending")]
    pub status: String,
    pub is_test_transfer: bool,
    pub cancellable_until: Option<DateTime<Utc>>,
    pub transaction_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transfer> for TransferView {
    fn from(t: Transfer) -> Self {
        Self {
            transfer_id: t.transfer_id.to_string(),
            sender_id: t.sender_id.map(|id| id.to_string()),
            recipient_id: t.recipient_id.map(|id| id.to_string()),
            recipient_handle: t.recipient_handle,
            amount: decimal_string(t.amount),
            currency: t.currency,
            fee_amount: decimal_string(t.fee_amount),
            status: t.status.as_str().to_string(),
            is_test_transfer: t.is_test_transfer,
            cancellable_until: t.cancellable_until,
            transaction_ref: t.transaction_ref,
            failure_reason: t.failure_reason.map(|r| r.as_code()),
            created_at: t.created_at,
            completed_at: t.completed_at,
        }
    }
}

/// POST /api/v1/transfers body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    #[serde(alias = "recipientTelegramUsername")]
    #[schema(example = "@bob")]
    pub recipient_handle: String,
    /// Decimal string
    #[schema(value_type = String, example = "3.00")]
    pub amount: StrictDecimal,
    #[schema(example = "USDC")]
    pub currency: String,
    #[serde(default)]
    pub is_test: bool,
}

impl From<CreateTransferRequest> for CreateTransfer {
    fn from(req: CreateTransferRequest) -> Self {
        Self {
            recipient_handle: req.recipient_handle,
            amount: req.amount.inner(),
            currency: req.currency,
            is_test: req.is_test,
        }
    }
}

/// GET /api/v1/transfers query
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTransfersQuery {
    /// Must equal the caller when present
    pub user_id: Option<String>,
    /// Page size, 1..=100 (default 50)
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// POST /api/v1/settlement/{id}/completed body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementCompletedRequest {
    #[serde(alias = "transactionHash")]
    #[schema(example = "0x5e1f...c0de")]
    pub transaction_ref: String,
}

/// POST /api/v1/settlement/{id}/failed body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementFailedRequest {
    /// Known codes: insufficient_funds, recipient_unresolvable, rejected, timeout
    #[schema(example = "insufficient_funds")]
    pub reason: String,
}

impl SettlementFailedRequest {
    pub fn failure_reason(&self) -> FailureReason {
        FailureReason::from_code(self.reason.trim())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PendingSettlementsQuery {
    /// Batch size, 1..=100 (default 50)
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{NewTransfer, TransferId};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_transfer_view_is_camel_case_with_string_amounts() {
        let transfer = NewTransfer {
            transfer_id: TransferId::new(),
            sender_id: None,
            recipient_id: None,
            recipient_handle: "bob".to_string(),
            amount: Decimal::from_str("3.000000000000000000").unwrap(),
            currency: "USDC".to_string(),
            fee_amount: Decimal::from_str("0.015").unwrap(),
            is_test_transfer: false,
            cancellable_until: None,
            created_at: Utc::now(),
        }
        .into_pending();

        let json = serde_json::to_value(TransferView::from(transfer)).unwrap();
        assert_eq!(json["amount"], "3");
        assert_eq!(json["feeAmount"], "0.015");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["isTestTransfer"], false);
        assert!(json["cancellableUntil"].is_null());
    }

    #[test]
    fn test_create_request_accepts_legacy_field_name() {
        let req: CreateTransferRequest = serde_json::from_str(
            r#"{"recipientTelegramUsername":"@bob","amount":"2.5","currency":"usdc"}"#,
        )
        .unwrap();
        assert_eq!(req.recipient_handle, "@bob");
        assert!(!req.is_test);

        let create = CreateTransfer::from(req);
        assert_eq!(create.amount, Decimal::from_str("2.5").unwrap());
    }

    #[test]
    fn test_create_request_rejects_numeric_amount() {
        let result = serde_json::from_str::<CreateTransferRequest>(
            r#"{"recipientHandle":"bob","amount":2.5,"currency":"USDC"}"#,
        );
        assert!(result.is_err());
    }
}
