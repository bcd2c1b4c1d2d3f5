//! Fiat Withdrawals
//!
//! A withdrawal cashes out crypto to a user's bank account. The fee and the
//! fiat proceeds are fixed when it is requested; afterwards only the payout
//! processor moves it forward.
//!
//! # State Machine
//!
//! ```text
//! PENDING ── processing ──► PROCESSING ── completed ──► COMPLETED
//!    │                          │
//!    └──────── failed ──────────┴────────► FAILED
//! ```
//!
//! Every report is one conditional write; COMPLETED and FAILED never change.

pub mod db;
pub mod error;
pub mod memory;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use db::PgWithdrawalStore;
pub use error::{WithdrawalConflict, WithdrawalError};
pub use memory::MemoryWithdrawalStore;
pub use service::{RequestWithdrawal, WithdrawalService};
pub use state::{WithdrawalEvent, WithdrawalStatus};
pub use store::WithdrawalStore;
pub use types::{Withdrawal, WithdrawalId, WithdrawalPolicy};
