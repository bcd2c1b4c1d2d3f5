use axum::{Json, extract::State};
use std::sync::Arc;

use super::service::{AuthResponse, TelegramLoginRequest};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ApiJson, ErrorResponse};

/// Log in with Telegram Web App init data
///
/// POST /api/v1/auth/telegram
#[utoipa::path(
    post,
    path = "/api/v1/auth/telegram",
    request_body = TelegramLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Malformed init data", body = ErrorResponse),
        (status = 401, description = "Signature mismatch or stale init data", body = ErrorResponse),
        (status = 503, description = "Telegram login not configured", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn telegram_login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<TelegramLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if req.init_data.trim().is_empty() {
        return Err(ApiError::bad_request("initData is required"));
    }

    let resp = state.user_auth.login_with_telegram(&req.init_data).await?;
    Ok(Json(resp))
}
