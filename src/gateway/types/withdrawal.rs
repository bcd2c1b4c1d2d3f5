//! Withdrawal request and view types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::money::{StrictDecimal, decimal_string};
use crate::withdrawal::{RequestWithdrawal, Withdrawal};

/// Withdrawal as returned by the API. The bank account is not echoed back.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalView {
    #[schema(example = "3b8e4c1a-0c55-4e0b-8a43-5f0f6f7e9d21")]
    pub withdrawal_id: String,
    pub user_id: String,
    #[schema(example = "100")]
    pub crypto_amount: String,
    #[schema(example = "USDC")]
    pub crypto_currency: String,
    #[schema(example = "1")]
    pub fee_amount: String,
    #[schema(example = "99")]
    pub fiat_amount: String,
    #[schema(example = "USD")]
    pub fiat_currency: String,
    #[schema(example = "pending")]
    pub status: String,
    pub failure_reason: Option<String>,
    pub estimated_arrival: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(w: Withdrawal) -> Self {
        Self {
            withdrawal_id: w.withdrawal_id.to_string(),
            user_id: w.user_id.to_string(),
            crypto_amount: decimal_string(w.crypto_amount),
            crypto_currency: w.crypto_currency,
            fee_amount: decimal_string(w.fee_amount),
            fiat_amount: decimal_string(w.fiat_amount),
            fiat_currency: w.fiat_currency,
            status: w.status.as_str().to_string(),
            failure_reason: w.failure_reason,
            estimated_arrival: w.estimated_arrival,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

/// POST /api/v1/withdrawals body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    /// Decimal string
    #[serde(alias = "cryptoAmount")]
    #[schema(value_type = String, example = "100")]
    pub amount: StrictDecimal,
    #[serde(alias = "cryptoCurrency")]
    #[schema(example = "USDC")]
    pub currency: String,
    #[schema(example = "bank-acct-7781")]
    pub bank_account_id: String,
}

impl From<CreateWithdrawalRequest> for RequestWithdrawal {
    fn from(req: CreateWithdrawalRequest) -> Self {
        Self {
            amount: req.amount.inner(),
            currency: req.currency,
            bank_account_id: req.bank_account_id,
        }
    }
}

/// GET /api/v1/withdrawals query
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListWithdrawalsQuery {
    /// Page size, 1..=100 (default 50)
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Payout processor status report
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStatusRequest {
    /// processing | completed | failed
    #[schema(example = "processing")]
    pub status: String,
    /// Required when status is failed
    #[schema(example = "account_closed")]
    pub reason: Option<String>,
}
