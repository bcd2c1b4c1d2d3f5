//! Fiat withdrawal handlers
//!
//! Users request and read their own withdrawals with a bearer JWT. The
//! payout processor polls and reports status on the settlement routes.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiJson, ApiQuery, CreateWithdrawalRequest, ErrorResponse, ListWithdrawalsQuery,
    PendingSettlementsQuery, WithdrawalListResponse, WithdrawalResponse, WithdrawalStatusRequest,
    WithdrawalView,
};
use crate::identity::AuthenticatedUser;
use crate::transfer::Page;
use crate::withdrawal::{WithdrawalId, WithdrawalStatus};

fn parse_withdrawal_id(raw: &str) -> Result<WithdrawalId, ApiError> {
    raw.parse::<WithdrawalId>()
        .map_err(|_| ApiError::bad_request(format!("Invalid withdrawal id: {}", raw)))
}

/// Request a fiat withdrawal
///
/// POST /api/v1/withdrawals
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals",
    request_body = CreateWithdrawalRequest,
    responses(
        (status = 201, description = "Withdrawal recorded as pending", body = WithdrawalResponse),
        (status = 400, description = "Invalid amount, currency or bank account", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), ApiError> {
    let withdrawal = state
        .withdrawals
        .request_withdrawal(&identity, req.into())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(WithdrawalResponse::new(WithdrawalView::from(withdrawal))),
    ))
}

/// List the caller's withdrawals, newest first
///
/// GET /api/v1/withdrawals
#[utoipa::path(
    get,
    path = "/api/v1/withdrawals",
    params(ListWithdrawalsQuery),
    responses(
        (status = 200, description = "The caller's withdrawals", body = WithdrawalListResponse),
        (status = 400, description = "Malformed limit or offset", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<ListWithdrawalsQuery>,
) -> Result<Json<WithdrawalListResponse>, ApiError> {
    let page = Page::new(query.limit, query.offset);
    let withdrawals = state.withdrawals.list_withdrawals(&identity, page).await?;
    Ok(Json(WithdrawalListResponse::new(
        withdrawals.into_iter().map(WithdrawalView::from).collect(),
    )))
}

/// Get one withdrawal
///
/// GET /api/v1/withdrawals/{id}
#[utoipa::path(
    get,
    path = "/api/v1/withdrawals/{id}",
    params(("id" = String, Path, description = "Withdrawal id (UUID)")),
    responses(
        (status = 200, description = "Withdrawal", body = WithdrawalResponse),
        (status = 403, description = "Withdrawal belongs to another user", body = ErrorResponse),
        (status = 404, description = "Unknown withdrawal", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn get_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal_id = parse_withdrawal_id(&id)?;
    let withdrawal = state
        .withdrawals
        .get_withdrawal(&identity, withdrawal_id)
        .await?;
    Ok(Json(WithdrawalResponse::new(WithdrawalView::from(withdrawal))))
}

/// Withdrawals waiting for the payout processor, oldest first
///
/// GET /api/v1/settlement/withdrawals/pending
#[utoipa::path(
    get,
    path = "/api/v1/settlement/withdrawals/pending",
    params(PendingSettlementsQuery),
    responses(
        (status = 200, description = "Pending withdrawals", body = WithdrawalListResponse),
        (status = 401, description = "Invalid settlement token", body = ErrorResponse)
    ),
    security(("settlement_token" = [])),
    tag = "Settlement"
)]
pub async fn pending_withdrawals(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PendingSettlementsQuery>,
) -> Result<Json<WithdrawalListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(Page::DEFAULT_LIMIT);
    let withdrawals = state.withdrawals.pending_withdrawals(limit).await?;
    Ok(Json(WithdrawalListResponse::new(
        withdrawals.into_iter().map(WithdrawalView::from).collect(),
    )))
}

/// Report payout progress for a withdrawal
///
/// POST /api/v1/settlement/withdrawals/{id}/status
#[utoipa::path(
    post,
    path = "/api/v1/settlement/withdrawals/{id}/status",
    params(("id" = String, Path, description = "Withdrawal id (UUID)")),
    request_body = WithdrawalStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = WithdrawalResponse),
        (status = 400, description = "Unknown status or missing reason", body = ErrorResponse),
        (status = 404, description = "Unknown withdrawal", body = ErrorResponse),
        (status = 409, description = "already finalized | already processing | not processing", body = ErrorResponse)
    ),
    security(("settlement_token" = [])),
    tag = "Settlement"
)]
pub async fn report_withdrawal_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<WithdrawalStatusRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal_id = parse_withdrawal_id(&id)?;
    let status = req
        .status
        .trim()
        .parse::<WithdrawalStatus>()
        .map_err(ApiError::bad_request)?;

    let withdrawal = match status {
        WithdrawalStatus::Processing => state.withdrawals.start_processing(withdrawal_id).await?,
        WithdrawalStatus::Completed => state.withdrawals.complete(withdrawal_id).await?,
        WithdrawalStatus::Failed => {
            let reason = req
                .reason
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("reason is required when status is failed"))?;
            state.withdrawals.fail(withdrawal_id, reason).await?
        }
        WithdrawalStatus::Pending => {
            return Err(ApiError::bad_request(
                "status must be processing, completed or failed",
            ));
        }
    };
    Ok(Json(WithdrawalResponse::new(WithdrawalView::from(withdrawal))))
}
