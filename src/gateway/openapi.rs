//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{AddContactRequest, ContactView, ContactsResponse, HealthResponse};
use crate::gateway::types::{
    CreateTransferRequest, CreateWithdrawalRequest, ErrorResponse, SettlementCompletedRequest,
    SettlementFailedRequest, TransferListResponse, TransferResponse, TransferView,
    WithdrawalListResponse, WithdrawalResponse, WithdrawalStatusRequest, WithdrawalView,
};
use crate::user_auth::service::{AuthResponse, TelegramLoginRequest, UserProfile};

/// Bearer JWT for users, shared bearer token for the settlement worker
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from POST /api/v1/auth/telegram"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "settlement_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Shared settlement worker token"))
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "HandlePay API",
        version = "1.0.0",
        description = "Send crypto to a Telegram handle and cash out to a bank account. Test transfers can be cancelled for five minutes.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::user_auth::handlers::telegram_login,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::transfer::list_transfers,
        crate::gateway::handlers::transfer::get_transfer,
        crate::gateway::handlers::transfer::cancel_transfer,
        crate::gateway::handlers::withdrawal::create_withdrawal,
        crate::gateway::handlers::withdrawal::list_withdrawals,
        crate::gateway::handlers::withdrawal::get_withdrawal,
        crate::gateway::handlers::contacts::list_contacts,
        crate::gateway::handlers::contacts::add_contact,
        crate::gateway::handlers::settlement::pending_settlements,
        crate::gateway::handlers::settlement::settlement_completed,
        crate::gateway::handlers::settlement::settlement_failed,
        crate::gateway::handlers::withdrawal::pending_withdrawals,
        crate::gateway::handlers::withdrawal::report_withdrawal_status,
    ),
    components(
        schemas(
            HealthResponse,
            TelegramLoginRequest,
            AuthResponse,
            UserProfile,
            CreateTransferRequest,
            TransferView,
            TransferResponse,
            TransferListResponse,
            CreateWithdrawalRequest,
            WithdrawalView,
            WithdrawalResponse,
            WithdrawalListResponse,
            WithdrawalStatusRequest,
            ErrorResponse,
            ContactView,
            ContactsResponse,
            AddContactRequest,
            SettlementCompletedRequest,
            SettlementFailedRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Telegram Web App login"),
        (name = "Transfers", description = "Create, list and cancel transfers (bearer JWT)"),
        (name = "Withdrawals", description = "Cash out to a bank account (bearer JWT)"),
        (name = "Contacts", description = "Mutual contacts (bearer JWT)"),
        (name = "Settlement", description = "Settlement worker callbacks (settlement token)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
