//! HTTP handlers, one module per resource

pub mod contacts;
pub mod health;
pub mod settlement;
pub mod transfer;
pub mod withdrawal;

pub use contacts::{AddContactRequest, ContactView, ContactsResponse, add_contact, list_contacts};
pub use health::{HealthResponse, health_check};
pub use settlement::{
    pending_settlements, settlement_auth_middleware, settlement_completed, settlement_failed,
};
pub use transfer::{cancel_transfer, create_transfer, get_transfer, list_transfers};
pub use withdrawal::{
    create_withdrawal, get_withdrawal, list_withdrawals, pending_withdrawals,
    report_withdrawal_status,
};
