//! Mutual contacts (bearer-authenticated)

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiJson, ErrorResponse};
use crate::identity::{AuthenticatedUser, MutualContact};
use crate::transfer::Clock;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    #[schema(example = "777000")]
    pub contact_telegram_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<MutualContact> for ContactView {
    fn from(c: MutualContact) -> Self {
        Self {
            contact_telegram_id: c.contact_telegram_id,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactsResponse {
    #[schema(example = true)]
    pub success: bool,
    pub contacts: Vec<ContactView>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    #[schema(example = "777000")]
    pub contact_telegram_id: String,
}

/// Contacts read degrade to an empty list; the failure is logged.
async fn load_contacts(state: &AppState, identity: &AuthenticatedUser) -> Vec<ContactView> {
    match state.users.mutual_contacts(identity.user_id).await {
        Ok(contacts) => contacts.into_iter().map(ContactView::from).collect(),
        Err(e) => {
            tracing::error!(user_id = %identity.user_id, error = %format!("{:#}", e), "Failed to load mutual contacts");
            Vec::new()
        }
    }
}

/// List the caller's mutual contacts
///
/// GET /api/v1/contacts
#[utoipa::path(
    get,
    path = "/api/v1/contacts",
    responses(
        (status = 200, description = "Mutual contacts", body = ContactsResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contacts"
)]
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
) -> Json<ContactsResponse> {
    Json(ContactsResponse {
        success: true,
        contacts: load_contacts(&state, &identity).await,
    })
}

/// Add a mutual contact (idempotent)
///
/// POST /api/v1/contacts
#[utoipa::path(
    post,
    path = "/api/v1/contacts",
    request_body = AddContactRequest,
    responses(
        (status = 200, description = "Updated contacts", body = ContactsResponse),
        (status = 400, description = "Invalid contact", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Contacts"
)]
pub async fn add_contact(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedUser>,
    ApiJson(req): ApiJson<AddContactRequest>,
) -> Result<Json<ContactsResponse>, ApiError> {
    let contact = req.contact_telegram_id.trim();
    if contact.is_empty() {
        return Err(ApiError::bad_request("contactTelegramId is required"));
    }
    if contact == identity.telegram_id {
        return Err(ApiError::bad_request("Cannot add yourself as a contact"));
    }

    let now = state.transfers.ledger().clock().now();
    state
        .users
        .add_contact(identity.user_id, contact, now)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %identity.user_id, error = %format!("{:#}", e), "Failed to add contact");
            ApiError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                super::super::types::error_codes::INTERNAL_ERROR,
                "Internal server error",
            )
        })?;

    Ok(Json(ContactsResponse {
        success: true,
        contacts: load_contacts(&state, &identity).await,
    }))
}
