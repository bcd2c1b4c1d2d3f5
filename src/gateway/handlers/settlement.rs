//! Settlement worker callbacks
//!
//! The worker that moves funds on-chain polls for settleable transfers and
//! reports each outcome back. The payout processor does the same for fiat
//! withdrawals. These routes are authenticated with a shared bearer token
//! instead of a user JWT.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiJson, ApiQuery, ErrorResponse, PendingSettlementsQuery,
    SettlementCompletedRequest, SettlementFailedRequest, TransferListResponse, TransferResponse,
    TransferView,
};
use super::transfer::parse_transfer_id;
use crate::transfer::Page;
use crate::user_auth::middleware::bearer_token;

/// Require `Authorization: Bearer <settlement token>`.
pub async fn settlement_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .settlement_token
        .as_deref()
        .ok_or_else(|| ApiError::unavailable("Settlement callbacks are not configured"))?;

    let presented = bearer_token(&request)?;
    // Compare digests so the comparison does not depend on token length
    if Sha256::digest(presented.as_bytes()) != Sha256::digest(expected.as_bytes()) {
        tracing::warn!("Rejected settlement callback credentials");
        return Err(ApiError::unauthorized("Invalid settlement token"));
    }

    Ok(next.run(request).await)
}

/// Transfers ready for settlement, oldest first
///
/// GET /api/v1/settlement/pending
#[utoipa::path(
    get,
    path = "/api/v1/settlement/pending",
    params(PendingSettlementsQuery),
    responses(
        (status = 200, description = "Pending transfers outside any cancellation window", body = TransferListResponse),
        (status = 401, description = "Invalid settlement token", body = ErrorResponse)
    ),
    security(("settlement_token" = [])),
    tag = "Settlement"
)]
pub async fn pending_settlements(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PendingSettlementsQuery>,
) -> Result<Json<TransferListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(Page::DEFAULT_LIMIT);
    let transfers = state.transfers.pending_settlements(limit).await?;
    Ok(Json(TransferListResponse::new(
        transfers.into_iter().map(TransferView::from).collect(),
    )))
}

/// Report a successful settlement
///
/// POST /api/v1/settlement/{id}/completed
#[utoipa::path(
    post,
    path = "/api/v1/settlement/{id}/completed",
    params(("id" = String, Path, description = "Transfer id (UUID)")),
    request_body = SettlementCompletedRequest,
    responses(
        (status = 200, description = "Transfer completed", body = TransferResponse),
        (status = 404, description = "Unknown transfer", body = ErrorResponse),
        (status = 409, description = "Transfer already finalized", body = ErrorResponse)
    ),
    security(("settlement_token" = [])),
    tag = "Settlement"
)]
pub async fn settlement_completed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SettlementCompletedRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer_id = parse_transfer_id(&id)?;
    let transfer = state
        .transfers
        .settle_completed(transfer_id, &req.transaction_ref)
        .await?;
    Ok(Json(TransferResponse::new(TransferView::from(transfer))))
}

/// Report a failed settlement
///
/// POST /api/v1/settlement/{id}/failed
#[utoipa::path(
    post,
    path = "/api/v1/settlement/{id}/failed",
    params(("id" = String, Path, description = "Transfer id (UUID)")),
    request_body = SettlementFailedRequest,
    responses(
        (status = 200, description = "Transfer failed", body = TransferResponse),
        (status = 404, description = "Unknown transfer", body = ErrorResponse),
        (status = 409, description = "Transfer already finalized", body = ErrorResponse)
    ),
    security(("settlement_token" = [])),
    tag = "Settlement"
)]
pub async fn settlement_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SettlementFailedRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer_id = parse_transfer_id(&id)?;
    if req.reason.trim().is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }
    let transfer = state
        .transfers
        .settle_failed(transfer_id, req.failure_reason())
        .await?;
    Ok(Json(TransferResponse::new(TransferView::from(transfer))))
}
