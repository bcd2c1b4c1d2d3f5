//! Transfer Error Types

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use super::types::TransferId;
use crate::fee::FeeError;

/// Why a lifecycle guard rejected a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Transfer already left PENDING
    AlreadyFinalized,
    /// Test transfer whose cancellation deadline has passed
    WindowExpired,
    /// Not a test transfer; only settlement may finalize it
    NotCancellable,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::AlreadyFinalized => "already finalized",
            ConflictReason::WindowExpired => "window expired",
            ConflictReason::NotCancellable => "not cancellable",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount must be between {min} and {max}")]
    AmountOutOfRange { min: Decimal, max: Decimal },

    #[error("Recipient handle is required")]
    InvalidRecipient,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Cannot send a transfer to yourself")]
    SelfTransfer,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // === Access Errors ===
    #[error("Only the sender may perform this action")]
    Forbidden,

    // === Lifecycle Errors ===
    #[error("Transfer not found: {0}")]
    NotFound(TransferId),

    #[error("{0}")]
    Conflict(ConflictReason),

    // === System Errors ===
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            TransferError::InvalidRecipient => "INVALID_RECIPIENT",
            TransferError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            TransferError::SelfTransfer => "SELF_TRANSFER",
            TransferError::InvalidParameter(_) => "INVALID_PARAMETER",
            TransferError::Forbidden => "FORBIDDEN",
            TransferError::NotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::Persistence(_) => "PERSISTENCE_ERROR",
            TransferError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount
            | TransferError::AmountOutOfRange { .. }
            | TransferError::InvalidRecipient
            | TransferError::UnsupportedCurrency(_)
            | TransferError::SelfTransfer
            | TransferError::InvalidParameter(_) => 400,
            TransferError::Forbidden => 403,
            TransferError::NotFound(_) => 404,
            TransferError::Conflict(_) => 409,
            TransferError::Persistence(_) | TransferError::Internal(_) => 500,
        }
    }

    /// Message safe to return to API clients; system errors stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::Persistence(_) | TransferError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Persistence(e.to_string())
    }
}

impl From<FeeError> for TransferError {
    fn from(e: FeeError) -> Self {
        match e {
            FeeError::InvalidAmount => TransferError::InvalidAmount,
            FeeError::Overflow => TransferError::InvalidParameter(e.to_string()),
        }
    }
}
