//! Transfer Ledger
//!
//! Drives the lifecycle on top of a [`TransferStore`]: validates and prices
//! new transfers, stamps lifecycle deadlines from the injected [`Clock`], and
//! turns failed conditional writes into conflict reasons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use super::clock::Clock;
use super::error::TransferError;
use super::state::{TransferEvent, TransferStatus};
use super::store::TransferStore;
use super::types::{
    FailureReason, NewTransfer, Page, Transfer, TransferId, TransferLimits, normalize_handle,
};
use crate::fee::FeeSchedule;
use crate::identity::UserId;

/// A mutation out of PENDING together with the data it records.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Cancel,
    Complete { transaction_ref: String },
    Fail { reason: FailureReason },
}

impl Transition {
    /// The lifecycle event this mutation represents for `transfer` at `now`
    pub fn event(&self, transfer: &Transfer, now: DateTime<Utc>) -> TransferEvent {
        match self {
            Transition::Cancel => TransferEvent::Cancel {
                now,
                cancellable_until: transfer.cancellable_until,
            },
            Transition::Complete { .. } => TransferEvent::SettlementSucceeded,
            Transition::Fail { .. } => TransferEvent::SettlementFailed,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Transition::Cancel => "cancelled",
            Transition::Complete { .. } => "completed",
            Transition::Fail { .. } => "failed",
        }
    }
}

/// Check the guard and, if it holds, apply the transition to `transfer`.
///
/// Callers must hold exclusive access to the record for the duration of the
/// call; this is the in-memory form of the conditional row update.
pub fn apply_transition(
    transfer: &mut Transfer,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<(), TransferError> {
    let next = transfer
        .status
        .apply(&transition.event(transfer, now))
        .map_err(TransferError::Conflict)?;

    transfer.status = next;
    transfer.completed_at = Some(now);
    match transition {
        Transition::Cancel => {}
        Transition::Complete { transaction_ref } => {
            transfer.transaction_ref = Some(transaction_ref.clone());
        }
        Transition::Fail { reason } => {
            transfer.failure_reason = Some(reason.clone());
        }
    }
    Ok(())
}

/// Explain why a conditional write on `current` did not match.
///
/// `current` is the row as re-read after the write affected nothing.
pub fn rejection(current: &Transfer, transition: &Transition, now: DateTime<Utc>) -> TransferError {
    match current.status.apply(&transition.event(current, now)) {
        Err(reason) => TransferError::Conflict(reason),
        Ok(_) => TransferError::Internal(format!(
            "conditional {} on transfer {} matched no row although its guard holds",
            transition.action(),
            current.transfer_id
        )),
    }
}

/// Lifecycle authority for transfers.
pub struct TransferLedger {
    store: Arc<dyn TransferStore>,
    clock: Arc<dyn Clock>,
    fees: FeeSchedule,
    limits: TransferLimits,
}

impl TransferLedger {
    pub fn new(
        store: Arc<dyn TransferStore>,
        clock: Arc<dyn Clock>,
        fees: FeeSchedule,
        limits: TransferLimits,
    ) -> Self {
        Self {
            store,
            clock,
            fees,
            limits,
        }
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn TransferStore> {
        &self.store
    }

    /// Validate, price and persist a new PENDING transfer.
    ///
    /// Test transfers get `cancellable_until = created_at + cancel window`.
    pub async fn create(
        &self,
        sender_id: Option<UserId>,
        recipient_id: Option<UserId>,
        recipient_handle: &str,
        amount: Decimal,
        currency: &str,
        is_test: bool,
    ) -> Result<Transfer, TransferError> {
        let handle = normalize_handle(recipient_handle).ok_or(TransferError::InvalidRecipient)?;

        let currency = currency.trim().to_uppercase();
        if !self.limits.supports(&currency) {
            return Err(TransferError::UnsupportedCurrency(currency));
        }

        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        let (min, max) = self.limits.bounds(is_test);
        if amount < min || amount > max {
            return Err(TransferError::AmountOutOfRange { min, max });
        }

        let fee_amount = self.fees.compute(amount)?;
        let created_at = self.clock.now();
        let cancellable_until = is_test.then(|| created_at + self.limits.cancel_window);

        let new = NewTransfer {
            transfer_id: TransferId::new(),
            sender_id,
            recipient_id,
            recipient_handle: handle,
            amount,
            currency,
            fee_amount,
            is_test_transfer: is_test,
            cancellable_until,
            created_at,
        };

        let transfer = self.store.create(new).await?;
        info!(
            transfer_id = %transfer.transfer_id,
            action = "created",
            amount = %transfer.amount,
            currency = %transfer.currency,
            fee = %transfer.fee_amount,
            is_test = transfer.is_test_transfer,
            recipient = %transfer.recipient_handle,
            "Transfer created"
        );
        Ok(transfer)
    }

    pub async fn get(&self, transfer_id: TransferId) -> Result<Transfer, TransferError> {
        self.store.get(transfer_id).await
    }

    pub async fn list_for_participant(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError> {
        self.store.list_for_participant(user_id, page).await
    }

    /// Cancel a PENDING test transfer inside its window.
    pub async fn cancel(&self, transfer_id: TransferId) -> Result<Transfer, TransferError> {
        let now = self.clock.now();
        let result = self.store.cancel(transfer_id, now).await;
        self.log_outcome(transfer_id, &Transition::Cancel, &result);
        result
    }

    /// Record successful settlement.
    pub async fn mark_completed(
        &self,
        transfer_id: TransferId,
        transaction_ref: &str,
    ) -> Result<Transfer, TransferError> {
        if transaction_ref.trim().is_empty() {
            return Err(TransferError::InvalidParameter(
                "settlement reference is required".to_string(),
            ));
        }
        let now = self.clock.now();
        let result = self
            .store
            .mark_completed(transfer_id, transaction_ref, now)
            .await;
        let transition = Transition::Complete {
            transaction_ref: transaction_ref.to_string(),
        };
        self.log_outcome(transfer_id, &transition, &result);
        result
    }

    /// Record failed settlement.
    pub async fn mark_failed(
        &self,
        transfer_id: TransferId,
        reason: FailureReason,
    ) -> Result<Transfer, TransferError> {
        let now = self.clock.now();
        let result = self.store.mark_failed(transfer_id, &reason, now).await;
        self.log_outcome(transfer_id, &Transition::Fail { reason }, &result);
        result
    }

    pub async fn attach_recipient(&self, handle: &str, user_id: UserId) -> Result<u64, TransferError> {
        let Some(handle) = normalize_handle(handle) else {
            return Ok(0);
        };
        let attached = self.store.attach_recipient(&handle, user_id).await?;
        if attached > 0 {
            info!(user_id = %user_id, handle = %handle, attached, "Attached pending transfers to recipient");
        }
        Ok(attached)
    }

    pub async fn list_settleable(&self, limit: u32) -> Result<Vec<Transfer>, TransferError> {
        let limit = limit.clamp(1, Page::MAX_LIMIT);
        self.store.list_settleable(self.clock.now(), limit).await
    }

    fn log_outcome(
        &self,
        transfer_id: TransferId,
        transition: &Transition,
        result: &Result<Transfer, TransferError>,
    ) {
        match result {
            Ok(transfer) => match transfer.status {
                TransferStatus::Completed => info!(
                    transfer_id = %transfer_id,
                    action = transition.action(),
                    transaction_ref = transfer.transaction_ref.as_deref().unwrap_or_default(),
                    "Transfer completed"
                ),
                TransferStatus::Failed => warn!(
                    transfer_id = %transfer_id,
                    action = transition.action(),
                    reason = %transfer.failure_reason.as_ref().map(|r| r.as_code()).unwrap_or_default(),
                    "Transfer failed"
                ),
                _ => info!(
                    transfer_id = %transfer_id,
                    action = transition.action(),
                    "Transfer {}",
                    transition.action()
                ),
            },
            Err(TransferError::Conflict(reason)) => info!(
                transfer_id = %transfer_id,
                action = transition.action(),
                reason = %reason,
                "Transfer transition rejected"
            ),
            Err(e) => warn!(
                transfer_id = %transfer_id,
                action = transition.action(),
                error = %e,
                "Transfer transition errored"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::clock::ManualClock;
    use crate::transfer::error::ConflictReason;
    use crate::transfer::memory::MemoryTransferStore;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap()
    }

    struct Harness {
        ledger: TransferLedger,
        store: Arc<MemoryTransferStore>,
        clock: Arc<ManualClock>,
        sender: UserId,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryTransferStore::new());
            let clock = Arc::new(ManualClock::new(t0()));
            let ledger = TransferLedger::new(
                store.clone(),
                clock.clone(),
                FeeSchedule::default(),
                TransferLimits::default(),
            );
            Self {
                ledger,
                store,
                clock,
                sender: UserId::from_uuid(Uuid::new_v4()),
            }
        }

        async fn create(&self, amount: &str, is_test: bool) -> Result<Transfer, TransferError> {
            self.ledger
                .create(Some(self.sender), None, "@bob", dec(amount), "usdc", is_test)
                .await
        }
    }

    #[test]
    fn test_apply_transition_records_settlement_data() {
        let mut transfer = NewTransfer {
            transfer_id: TransferId::new(),
            sender_id: None,
            recipient_id: None,
            recipient_handle: "bob".to_string(),
            amount: dec("10"),
            currency: "USDC".to_string(),
            fee_amount: dec("0.05"),
            is_test_transfer: false,
            cancellable_until: None,
            created_at: t0(),
        }
        .into_pending();

        let done = Transition::Complete {
            transaction_ref: "0xabc".to_string(),
        };
        apply_transition(&mut transfer, &done, t0() + Duration::seconds(3)).unwrap();
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.transaction_ref.as_deref(), Some("0xabc"));
        assert_eq!(transfer.completed_at, Some(t0() + Duration::seconds(3)));

        let before = transfer.clone();
        let err = apply_transition(&mut transfer, &Transition::Cancel, t0()).unwrap_err();
        assert_eq!(err, TransferError::Conflict(ConflictReason::AlreadyFinalized));
        assert_eq!(transfer, before, "rejected transition must not mutate");
    }

    #[tokio::test]
    async fn test_create_test_transfer_scenario() {
        let h = Harness::new();
        let transfer = h.create("3.00", true).await.unwrap();

        assert_eq!(transfer.fee_amount, dec("0.015"));
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.currency, "USDC");
        assert_eq!(transfer.recipient_handle, "bob");
        assert_eq!(transfer.created_at, t0());
        assert_eq!(
            transfer.cancellable_until,
            Some(transfer.created_at + Duration::seconds(300))
        );
        assert!(transfer.completed_at.is_none());

        h.clock.advance(Duration::seconds(60));
        let cancelled = h.ledger.cancel(transfer.transfer_id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert_eq!(cancelled.completed_at, Some(t0() + Duration::seconds(60)));

        let again = h.ledger.cancel(transfer.transfer_id).await.unwrap_err();
        assert_eq!(again, TransferError::Conflict(ConflictReason::AlreadyFinalized));
    }

    #[tokio::test]
    async fn test_non_test_transfer_has_no_window() {
        let h = Harness::new();
        let transfer = h.create("250", false).await.unwrap();
        assert!(!transfer.is_test_transfer);
        assert!(transfer.cancellable_until.is_none());
        assert_eq!(transfer.fee_amount, dec("1.25"));

        let err = h.ledger.cancel(transfer.transfer_id).await.unwrap_err();
        assert_eq!(err, TransferError::Conflict(ConflictReason::NotCancellable));
        assert_eq!(
            h.ledger.get(transfer.transfer_id).await.unwrap().status,
            TransferStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_amount_out_of_range_persists_nothing() {
        let h = Harness::new();
        let err = h.create("10000.01", false).await.unwrap_err();
        assert_eq!(
            err,
            TransferError::AmountOutOfRange {
                min: dec("1"),
                max: dec("10000")
            }
        );
        assert_eq!(h.store.len(), 0);

        // Test transfers have the tighter bound
        assert!(matches!(
            h.create("5.01", true).await,
            Err(TransferError::AmountOutOfRange { .. })
        ));
        assert!(h.create("5", true).await.is_ok());
        assert!(h.create("10000", false).await.is_ok());
        assert!(matches!(
            h.create("0.99", false).await,
            Err(TransferError::AmountOutOfRange { .. })
        ));
        assert_eq!(h.create("0", false).await, Err(TransferError::InvalidAmount));
        assert_eq!(h.store.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_recipient_and_currency() {
        let h = Harness::new();
        let err = h
            .ledger
            .create(Some(h.sender), None, "  @ ", dec("2"), "USDC", false)
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InvalidRecipient);

        let err = h
            .ledger
            .create(Some(h.sender), None, "bob", dec("2"), "DOGE", false)
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::UnsupportedCurrency("DOGE".to_string()));
        assert_eq!(h.store.len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_window_boundary() {
        let h = Harness::new();
        let inside = h.create("2", true).await.unwrap();
        let outside = h.create("2", true).await.unwrap();
        let deadline = inside.cancellable_until.unwrap();

        h.clock.set(deadline - Duration::milliseconds(1));
        assert_eq!(
            h.ledger.cancel(inside.transfer_id).await.unwrap().status,
            TransferStatus::Cancelled
        );

        h.clock.set(deadline + Duration::milliseconds(1));
        assert_eq!(
            h.ledger.cancel(outside.transfer_id).await.unwrap_err(),
            TransferError::Conflict(ConflictReason::WindowExpired)
        );
        assert_eq!(
            h.ledger.get(outside.transfer_id).await.unwrap().status,
            TransferStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_settlement_transitions_are_terminal() {
        let h = Harness::new();
        let transfer = h.create("20", false).await.unwrap();

        let done = h
            .ledger
            .mark_completed(transfer.transfer_id, "0xfeed")
            .await
            .unwrap();
        assert_eq!(done.status, TransferStatus::Completed);
        assert_eq!(done.transaction_ref.as_deref(), Some("0xfeed"));

        assert_eq!(
            h.ledger
                .mark_failed(transfer.transfer_id, FailureReason::Timeout)
                .await
                .unwrap_err(),
            TransferError::Conflict(ConflictReason::AlreadyFinalized)
        );
        assert_eq!(
            h.ledger
                .mark_completed(transfer.transfer_id, "0xother")
                .await
                .unwrap_err(),
            TransferError::Conflict(ConflictReason::AlreadyFinalized)
        );

        let stored = h.ledger.get(transfer.transfer_id).await.unwrap();
        assert_eq!(stored, done);
    }

    #[tokio::test]
    async fn test_mark_completed_requires_reference() {
        let h = Harness::new();
        let transfer = h.create("20", false).await.unwrap();
        assert!(matches!(
            h.ledger.mark_completed(transfer.transfer_id, " ").await,
            Err(TransferError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_transfer_is_not_found() {
        let h = Harness::new();
        let id = TransferId::new();
        assert_eq!(h.ledger.cancel(id).await, Err(TransferError::NotFound(id)));
        assert_eq!(h.ledger.get(id).await, Err(TransferError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_list_settleable_waits_for_window() {
        let h = Harness::new();
        let ordinary = h.create("20", false).await.unwrap();
        let test = h.create("2", true).await.unwrap();

        let ids: Vec<_> = h
            .ledger
            .list_settleable(10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.transfer_id)
            .collect();
        assert_eq!(ids, vec![ordinary.transfer_id]);

        h.clock.advance(Duration::minutes(5));
        let ids: Vec<_> = h
            .ledger
            .list_settleable(10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.transfer_id)
            .collect();
        assert_eq!(ids, vec![ordinary.transfer_id, test.transfer_id]);
    }
}
