//! Withdrawal Error Types

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use super::types::WithdrawalId;

/// Why a payout report was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalConflict {
    /// Completed or failed already
    AlreadyFinalized,
    /// Processing was already reported
    AlreadyProcessing,
    /// Completion reported before processing started
    NotProcessing,
}

impl WithdrawalConflict {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalConflict::AlreadyFinalized => "already finalized",
            WithdrawalConflict::AlreadyProcessing => "already processing",
            WithdrawalConflict::NotProcessing => "not processing",
        }
    }
}

impl fmt::Display for WithdrawalConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WithdrawalError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount must be between {min} and {max}")]
    AmountOutOfRange { min: Decimal, max: Decimal },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Bank account is required (at most {max_len} characters)")]
    InvalidBankAccount { max_len: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Withdrawal belongs to another user")]
    Forbidden,

    #[error("Withdrawal not found: {0}")]
    NotFound(WithdrawalId),

    #[error("{0}")]
    Conflict(WithdrawalConflict),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WithdrawalError {
    pub fn code(&self) -> &'static str {
        match self {
            WithdrawalError::InvalidAmount => "INVALID_AMOUNT",
            WithdrawalError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            WithdrawalError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            WithdrawalError::InvalidBankAccount { .. } => "INVALID_BANK_ACCOUNT",
            WithdrawalError::InvalidParameter(_) => "INVALID_PARAMETER",
            WithdrawalError::Forbidden => "FORBIDDEN",
            WithdrawalError::NotFound(_) => "WITHDRAWAL_NOT_FOUND",
            WithdrawalError::Conflict(_) => "CONFLICT",
            WithdrawalError::Persistence(_) => "PERSISTENCE_ERROR",
            WithdrawalError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            WithdrawalError::InvalidAmount
            | WithdrawalError::AmountOutOfRange { .. }
            | WithdrawalError::UnsupportedCurrency(_)
            | WithdrawalError::InvalidBankAccount { .. }
            | WithdrawalError::InvalidParameter(_) => 400,
            WithdrawalError::Forbidden => 403,
            WithdrawalError::NotFound(_) => 404,
            WithdrawalError::Conflict(_) => 409,
            WithdrawalError::Persistence(_) | WithdrawalError::Internal(_) => 500,
        }
    }

    /// Message safe to return to API clients
    pub fn public_message(&self) -> String {
        match self {
            WithdrawalError::Persistence(_) | WithdrawalError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for WithdrawalError {
    fn from(e: sqlx::Error) -> Self {
        WithdrawalError::Persistence(e.to_string())
    }
}
