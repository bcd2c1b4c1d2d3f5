//! Transfer persistence seam.
//!
//! Every status-changing method is a single atomic check-and-set against the
//! backend: the guard of the lifecycle transition and the write happen as one
//! operation, so concurrent cancel/settle calls for the same transfer produce
//! exactly one winner. Losers get [`TransferError::Conflict`] with the reason
//! read back from the row, and nothing is mutated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::TransferError;
use super::types::{FailureReason, NewTransfer, Page, Transfer, TransferId};
use crate::identity::UserId;

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Persist a new transfer in PENDING
    async fn create(&self, new: NewTransfer) -> Result<Transfer, TransferError>;

    /// Fetch one transfer, `NotFound` if the id is unknown
    async fn get(&self, transfer_id: TransferId) -> Result<Transfer, TransferError>;

    /// Transfers where `user_id` is sender or recipient, newest first.
    ///
    /// Ties on `created_at` keep insertion order.
    async fn list_for_participant(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError>;

    /// PENDING → CANCELLED iff test transfer and `cancellable_until > now`
    async fn cancel(
        &self,
        transfer_id: TransferId,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError>;

    /// PENDING → COMPLETED, recording the settlement reference
    async fn mark_completed(
        &self,
        transfer_id: TransferId,
        transaction_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError>;

    /// PENDING → FAILED, recording the failure reason
    async fn mark_failed(
        &self,
        transfer_id: TransferId,
        reason: &FailureReason,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError>;

    /// Fill in `recipient_id` on transfers addressed to `handle` whose
    /// recipient was unknown at creation. Returns the number of rows touched.
    async fn attach_recipient(&self, handle: &str, user_id: UserId) -> Result<u64, TransferError>;

    /// PENDING transfers the settlement worker may pick up, oldest first:
    /// ordinary transfers, and test transfers whose window has closed.
    async fn list_settleable(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transfer>, TransferError>;
}
