//! handlepay - send crypto to a Telegram username
//!
//! A transfer ledger with a time-boxed cancellation window for test
//! transfers, plus fiat cash-outs, served over HTTP.
//!
//! # Modules
//!
//! - [`fee`] - Bounded-percentage transfer fee
//! - [`transfer`] - Transfer records, lifecycle and the service surface
//! - [`withdrawal`] - Fiat cash-out requests and payout status
//! - [`identity`] - Registered users, handle resolution and contacts
//! - [`user_auth`] - Telegram login and JWT verification
//! - [`gateway`] - axum HTTP API and Swagger UI
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing setup

pub mod config;
pub mod db;
pub mod fee;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod transfer;
pub mod user_auth;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use fee::{FeeError, FeeSchedule, compute_fee};
pub use identity::{AuthenticatedUser, UserId};
pub use transfer::{
    ConflictReason, Transfer, TransferError, TransferId, TransferLedger, TransferService,
    TransferStatus,
};
pub use withdrawal::{Withdrawal, WithdrawalError, WithdrawalId, WithdrawalService};
