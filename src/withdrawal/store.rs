//! Withdrawal persistence seam.
//!
//! Status changes are one atomic check-and-set; concurrent reports for the
//! same withdrawal produce one winner and the rest see
//! [`WithdrawalError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::WithdrawalError;
use super::state::{WithdrawalEvent, WithdrawalStatus};
use super::types::{NewWithdrawal, Withdrawal, WithdrawalId};
use crate::identity::UserId;
use crate::transfer::Page;

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn create(&self, new: NewWithdrawal) -> Result<Withdrawal, WithdrawalError>;

    async fn get(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal, WithdrawalError>;

    /// The user's withdrawals, newest first
    async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Withdrawal>, WithdrawalError>;

    /// Withdrawals in `status`, oldest first
    async fn list_by_status(
        &self,
        status: WithdrawalStatus,
        limit: u32,
    ) -> Result<Vec<Withdrawal>, WithdrawalError>;

    /// Apply `event` iff the current status is one of `event.sources()`
    async fn transition(
        &self,
        withdrawal_id: WithdrawalId,
        event: &WithdrawalEvent,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, WithdrawalError>;
}

/// Check the guard and apply `event` to `withdrawal` in place.
///
/// Callers hold exclusive access to the record.
pub fn apply_event(
    withdrawal: &mut Withdrawal,
    event: &WithdrawalEvent,
    now: DateTime<Utc>,
) -> Result<(), WithdrawalError> {
    let next = withdrawal
        .status
        .apply(event)
        .map_err(WithdrawalError::Conflict)?;
    withdrawal.status = next;
    withdrawal.updated_at = now;
    if let WithdrawalEvent::Fail { reason } = event {
        withdrawal.failure_reason = Some(reason.clone());
    }
    Ok(())
}

/// Explain a conditional update that matched no row, given the re-read row.
pub fn rejection(current: &Withdrawal, event: &WithdrawalEvent) -> WithdrawalError {
    match current.status.apply(event) {
        Err(reason) => WithdrawalError::Conflict(reason),
        Ok(_) => WithdrawalError::Internal(format!(
            "conditional {} on withdrawal {} matched no row although its guard holds",
            event.action(),
            current.withdrawal_id
        )),
    }
}
