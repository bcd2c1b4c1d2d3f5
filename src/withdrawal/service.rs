//! Withdrawal Service
//!
//! User-facing calls take the [`AuthenticatedUser`] from the HTTP boundary.
//! Payout processor reports take none; the gateway authenticates them with
//! the settlement token.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::WithdrawalError;
use super::state::{WithdrawalEvent, WithdrawalStatus};
use super::store::WithdrawalStore;
use super::types::{
    MAX_BANK_ACCOUNT_LEN, NewWithdrawal, Withdrawal, WithdrawalId, WithdrawalPolicy,
    normalize_bank_account,
};
use crate::identity::AuthenticatedUser;
use crate::transfer::{Clock, Page};

pub const MAX_FAILURE_REASON_LEN: usize = 200;

/// Request to cash out `amount` of `currency` to a bank account
#[derive(Debug, Clone, PartialEq)]
pub struct RequestWithdrawal {
    pub amount: Decimal,
    pub currency: String,
    pub bank_account_id: String,
}

pub struct WithdrawalService {
    store: Arc<dyn WithdrawalStore>,
    clock: Arc<dyn Clock>,
    policy: WithdrawalPolicy,
}

impl WithdrawalService {
    pub fn new(
        store: Arc<dyn WithdrawalStore>,
        clock: Arc<dyn Clock>,
        policy: WithdrawalPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Record a PENDING withdrawal with its fee and fiat proceeds fixed.
    pub async fn request_withdrawal(
        &self,
        identity: &AuthenticatedUser,
        req: RequestWithdrawal,
    ) -> Result<Withdrawal, WithdrawalError> {
        let currency = req.currency.trim().to_uppercase();
        let bank_account_id = normalize_bank_account(&req.bank_account_id).ok_or(
            WithdrawalError::InvalidBankAccount {
                max_len: MAX_BANK_ACCOUNT_LEN,
            },
        )?;
        let quote = self.policy.quote(req.amount, &currency)?;

        let now = self.clock.now();
        let withdrawal = self
            .store
            .create(NewWithdrawal {
                withdrawal_id: WithdrawalId::new(),
                user_id: identity.user_id,
                crypto_amount: req.amount,
                crypto_currency: currency,
                fee_amount: quote.fee_amount,
                fiat_amount: quote.fiat_amount,
                fiat_currency: self.policy.fiat_currency.clone(),
                bank_account_id,
                estimated_arrival: now + self.policy.arrival,
                created_at: now,
            })
            .await?;

        // Bank account stays out of the logs
        info!(
            withdrawal_id = %withdrawal.withdrawal_id,
            user_id = %withdrawal.user_id,
            action = "created",
            amount = %withdrawal.crypto_amount,
            currency = %withdrawal.crypto_currency,
            fee = %withdrawal.fee_amount,
            fiat_amount = %withdrawal.fiat_amount,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// `identity`'s withdrawals, newest first
    pub async fn list_withdrawals(
        &self,
        identity: &AuthenticatedUser,
        page: Page,
    ) -> Result<Vec<Withdrawal>, WithdrawalError> {
        self.store.list_for_user(identity.user_id, page).await
    }

    pub async fn get_withdrawal(
        &self,
        identity: &AuthenticatedUser,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal, WithdrawalError> {
        let withdrawal = self.store.get(withdrawal_id).await?;
        if withdrawal.user_id != identity.user_id {
            return Err(WithdrawalError::Forbidden);
        }
        Ok(withdrawal)
    }

    /// Withdrawals waiting for the payout processor, oldest first
    pub async fn pending_withdrawals(&self, limit: u32) -> Result<Vec<Withdrawal>, WithdrawalError> {
        self.store
            .list_by_status(WithdrawalStatus::Pending, limit.clamp(1, Page::MAX_LIMIT))
            .await
    }

    pub async fn start_processing(
        &self,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal, WithdrawalError> {
        self.transition(withdrawal_id, WithdrawalEvent::StartProcessing)
            .await
    }

    pub async fn complete(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        self.transition(withdrawal_id, WithdrawalEvent::Complete).await
    }

    pub async fn fail(
        &self,
        withdrawal_id: WithdrawalId,
        reason: &str,
    ) -> Result<Withdrawal, WithdrawalError> {
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > MAX_FAILURE_REASON_LEN {
            return Err(WithdrawalError::InvalidParameter(format!(
                "reason must be 1 to {} characters",
                MAX_FAILURE_REASON_LEN
            )));
        }
        self.transition(
            withdrawal_id,
            WithdrawalEvent::Fail {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn transition(
        &self,
        withdrawal_id: WithdrawalId,
        event: WithdrawalEvent,
    ) -> Result<Withdrawal, WithdrawalError> {
        let result = self
            .store
            .transition(withdrawal_id, &event, self.clock.now())
            .await;

        match &result {
            Ok(withdrawal) if withdrawal.status == WithdrawalStatus::Failed => warn!(
                withdrawal_id = %withdrawal_id,
                action = event.action(),
                reason = withdrawal.failure_reason.as_deref().unwrap_or_default(),
                "Withdrawal failed"
            ),
            Ok(_) => info!(
                withdrawal_id = %withdrawal_id,
                action = event.action(),
                "Withdrawal {}",
                event.action()
            ),
            Err(WithdrawalError::Conflict(reason)) => info!(
                withdrawal_id = %withdrawal_id,
                action = event.action(),
                reason = %reason,
                "Withdrawal transition rejected"
            ),
            Err(e) => warn!(
                withdrawal_id = %withdrawal_id,
                action = event.action(),
                error = %e,
                "Withdrawal transition errored"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserId;
    use crate::transfer::ManualClock;
    use crate::withdrawal::error::WithdrawalConflict;
    use crate::withdrawal::memory::MemoryWithdrawalStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::str::FromStr;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn fixture() -> (WithdrawalService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let service = WithdrawalService::new(
            Arc::new(MemoryWithdrawalStore::new()),
            clock.clone(),
            WithdrawalPolicy::default(),
        );
        (service, clock)
    }

    fn user(handle: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: UserId::new(),
            telegram_id: format!("tg-{}", handle),
            username: Some(handle.to_string()),
        }
    }

    fn cash_out(amount: &str, currency: &str) -> RequestWithdrawal {
        RequestWithdrawal {
            amount: Decimal::from_str(amount).unwrap(),
            currency: currency.to_string(),
            bank_account_id: " acct-001 ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_request_fixes_quote_and_arrival() {
        let (service, _) = fixture();
        let alice = user("alice");

        let w = service
            .request_withdrawal(&alice, cash_out("250", "usdc"))
            .await
            .unwrap();
        assert_eq!(w.status, WithdrawalStatus::Pending);
        assert_eq!(w.crypto_currency, "USDC");
        assert_eq!(w.fee_amount, Decimal::from_str("2.5").unwrap());
        assert_eq!(w.fiat_amount, Decimal::from_str("247.5").unwrap());
        assert_eq!(w.fiat_currency, "USD");
        assert_eq!(w.bank_account_id, "acct-001");
        assert_eq!(w.estimated_arrival, t0() + Duration::days(3));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (service, _) = fixture();
        let alice = user("alice");

        let mut blank = cash_out("10", "USDC");
        blank.bank_account_id = "  ".to_string();
        assert_eq!(
            service.request_withdrawal(&alice, blank).await,
            Err(WithdrawalError::InvalidBankAccount { max_len: 64 })
        );
        assert_eq!(
            service.request_withdrawal(&alice, cash_out("10", "DOGE")).await,
            Err(WithdrawalError::UnsupportedCurrency("DOGE".to_string()))
        );
        assert_eq!(
            service.request_withdrawal(&alice, cash_out("-1", "USDC")).await,
            Err(WithdrawalError::InvalidAmount)
        );
        assert!(
            service
                .list_withdrawals(&alice, Page::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_only_owner_can_read() {
        let (service, _) = fixture();
        let alice = user("alice");
        let eve = user("eve");
        let w = service
            .request_withdrawal(&alice, cash_out("10", "DAI"))
            .await
            .unwrap();

        assert_eq!(
            service.get_withdrawal(&alice, w.withdrawal_id).await.unwrap(),
            w
        );
        assert_eq!(
            service.get_withdrawal(&eve, w.withdrawal_id).await,
            Err(WithdrawalError::Forbidden)
        );
        assert!(
            service
                .list_withdrawals(&eve, Page::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_payout_reports() {
        let (service, clock) = fixture();
        let alice = user("alice");
        let paid = service
            .request_withdrawal(&alice, cash_out("10", "USDC"))
            .await
            .unwrap();
        let bounced = service
            .request_withdrawal(&alice, cash_out("20", "USDC"))
            .await
            .unwrap();
        assert_eq!(service.pending_withdrawals(10).await.unwrap().len(), 2);

        assert_eq!(
            service.complete(paid.withdrawal_id).await,
            Err(WithdrawalError::Conflict(WithdrawalConflict::NotProcessing))
        );

        clock.advance(Duration::minutes(5));
        let processing = service.start_processing(paid.withdrawal_id).await.unwrap();
        assert_eq!(processing.status, WithdrawalStatus::Processing);
        assert_eq!(processing.updated_at, t0() + Duration::minutes(5));
        assert_eq!(service.pending_withdrawals(10).await.unwrap().len(), 1);

        let done = service.complete(paid.withdrawal_id).await.unwrap();
        assert_eq!(done.status, WithdrawalStatus::Completed);

        assert!(matches!(
            service.fail(bounced.withdrawal_id, "   ").await,
            Err(WithdrawalError::InvalidParameter(_))
        ));
        let failed = service
            .fail(bounced.withdrawal_id, "account_closed")
            .await
            .unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("account_closed"));

        assert_eq!(
            service.fail(paid.withdrawal_id, "late").await,
            Err(WithdrawalError::Conflict(WithdrawalConflict::AlreadyFinalized))
        );
        assert!(service.pending_withdrawals(10).await.unwrap().is_empty());
    }
}
