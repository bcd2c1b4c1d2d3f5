//! Transfer handlers (bearer-authenticated)

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiJson, ApiQuery, CreateTransferRequest, ErrorResponse, ListTransfersQuery,
    TransferListResponse, TransferResponse, TransferView,
};
use crate::identity::{AuthenticatedUser, UserId};
use crate::transfer::{Page, TransferId};

pub(crate) fn parse_transfer_id(raw: &str) -> Result<TransferId, ApiError> {
    raw.parse::<TransferId>()
        .map_err(|_| ApiError::bad_request(format!("Invalid transfer id: {}", raw)))
}

/// Create a transfer
///
/// POST /api/v1/transfers
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer created in pending state", body = TransferResponse),
        (status = 400, description = "Invalid amount, recipient or currency", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<CreateTransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), ApiError> {
    let transfer = state
        .transfers
        .create_transfer(&identity, req.into())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TransferResponse::new(TransferView::from(transfer))),
    ))
}

/// List the caller's transfers, newest first
///
/// GET /api/v1/transfers
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(ListTransfersQuery),
    responses(
        (status = 200, description = "Transfers sent or received by the caller", body = TransferListResponse),
        (status = 400, description = "Malformed userId, limit or offset", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "userId is not the caller", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<ListTransfersQuery>,
) -> Result<Json<TransferListResponse>, ApiError> {
    if let Some(requested) = query.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let requested = requested
            .parse::<UserId>()
            .map_err(|_| ApiError::bad_request(format!("Invalid userId: {}", requested)))?;
        if requested != identity.user_id {
            return Err(ApiError::forbidden("Cannot list another user's transfers"));
        }
    }

    let page = Page::new(query.limit, query.offset);
    let transfers = state.transfers.list_transfers(&identity, page).await?;
    Ok(Json(TransferListResponse::new(
        transfers.into_iter().map(TransferView::from).collect(),
    )))
}

/// Get one transfer
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = String, Path, description = "Transfer id (UUID)")),
    responses(
        (status = 200, description = "Transfer", body = TransferResponse),
        (status = 403, description = "Caller is neither sender nor recipient", body = ErrorResponse),
        (status = 404, description = "Unknown transfer", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer_id = parse_transfer_id(&id)?;
    let transfer = state.transfers.get_transfer(&identity, transfer_id).await?;
    Ok(Json(TransferResponse::new(TransferView::from(transfer))))
}

/// Cancel a test transfer inside its window
///
/// POST /api/v1/transfers/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    params(("id" = String, Path, description = "Transfer id (UUID)")),
    responses(
        (status = 200, description = "Transfer cancelled", body = TransferResponse),
        (status = 403, description = "Caller is not the sender", body = ErrorResponse),
        (status = 404, description = "Unknown transfer", body = ErrorResponse),
        (status = 409, description = "already finalized | window expired | not cancellable", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn cancel_transfer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer_id = parse_transfer_id(&id)?;
    let transfer = state
        .transfers
        .cancel_transfer(&identity, transfer_id)
        .await?;
    Ok(Json(TransferResponse::new(TransferView::from(transfer))))
}
