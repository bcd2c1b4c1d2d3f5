//! API Response types and error codes
//!
//! Every response carries `success`. Successful bodies put their payload
//! beside it (`{"success": true, "transfer": {...}}`), failures carry a
//! machine-readable `code` and a human-readable `error`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{TransferView, WithdrawalView};
use crate::transfer::TransferError;
use crate::user_auth::AuthError;
use crate::withdrawal::WithdrawalError;

// ============================================================================
// Success envelopes
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    #[schema(example = true)]
    pub success: bool,
    pub transfer: TransferView,
}

impl TransferResponse {
    pub fn new(transfer: TransferView) -> Self {
        Self {
            success: true,
            transfer,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub transfers: Vec<TransferView>,
}

impl TransferListResponse {
    pub fn new(transfers: Vec<TransferView>) -> Self {
        Self {
            success: true,
            transfers,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalResponse {
    #[schema(example = true)]
    pub success: bool,
    pub withdrawal: WithdrawalView,
}

impl WithdrawalResponse {
    pub fn new(withdrawal: WithdrawalView) -> Self {
        Self {
            success: true,
            withdrawal,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub withdrawals: Vec<WithdrawalView>,
}

impl WithdrawalListResponse {
    pub fn new(withdrawals: Vec<WithdrawalView>) -> Self {
        Self {
            success: true,
            withdrawals,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "CONFLICT")]
    pub code: String,
    #[schema(example = "window expired")]
    pub error: String,
}

/// Handler error: status plus the error body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            code: self.code.to_string(),
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = e.code(), error = %e, "Transfer request failed");
        }
        Self::new(status, e.code(), e.public_message())
    }
}

impl From<WithdrawalError> for ApiError {
    fn from(e: WithdrawalError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = e.code(), error = %e, "Withdrawal request failed");
        }
        Self::new(status, e.code(), e.public_message())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if status.is_server_error() {
            tracing::error!(code = e.code(), error = %e, "Auth request failed");
            "Internal server error".to_string()
        } else {
            e.to_string()
        };
        Self::new(status, e.code(), message)
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes not owned by a domain error type
pub mod error_codes {
    pub const INVALID_PARAMETER: &str = "INVALID_PARAMETER";
    pub const MISSING_AUTH: &str = "MISSING_AUTH";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}
