//! Transfers
//!
//! A transfer moves `amount` of `currency` from a sender to a recipient
//! named by handle. Test transfers can be cancelled by the sender for a
//! short window after creation; everything else waits for settlement.
//!
//! # State Machine
//!
//! ```text
//!            cancel (test, inside window)
//!          ┌──────────────────────────────► CANCELLED
//!          │
//! PENDING ─┼── settlement succeeded ──────► COMPLETED
//!          │
//!          └── settlement failed ─────────► FAILED
//! ```
//!
//! # Invariants
//!
//! 1. **Single winner**: every transition out of PENDING is one conditional
//!    write; concurrent cancel/settle calls race and exactly one succeeds
//! 2. **Terminal is final**: COMPLETED, CANCELLED and FAILED never change
//! 3. **Fee fixed at creation**: never recomputed

pub mod clock;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod service;
pub mod state;
pub mod store;
pub mod types;


// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use db::PgTransferStore;
pub use error::{ConflictReason, TransferError};
pub use lifecycle::TransferLedger;
pub use memory::MemoryTransferStore;
pub use service::{CreateTransfer, TransferService};
pub use state::{TransferEvent, TransferStatus};
pub use store::TransferStore;
pub use types::{FailureReason, NewTransfer, Page, Transfer, TransferId, TransferLimits};
