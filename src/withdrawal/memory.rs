//! In-memory withdrawal store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::error::WithdrawalError;
use super::state::{WithdrawalEvent, WithdrawalStatus};
use super::store::{WithdrawalStore, apply_event};
use super::types::{NewWithdrawal, Withdrawal, WithdrawalId};
use crate::identity::UserId;
use crate::transfer::Page;

#[derive(Default)]
struct Inner {
    rows: Vec<Withdrawal>,
    index: HashMap<WithdrawalId, usize>,
}

#[derive(Default)]
pub struct MemoryWithdrawalStore {
    inner: Mutex<Inner>,
}

impl MemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, WithdrawalError> {
        self.inner
            .lock()
            .map_err(|_| WithdrawalError::Internal("withdrawal store lock poisoned".to_string()))
    }
}

#[async_trait]
impl WithdrawalStore for MemoryWithdrawalStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new: NewWithdrawal) -> Result<Withdrawal, WithdrawalError> {
        let mut inner = self.lock()?;
        if inner.index.contains_key(&new.withdrawal_id) {
            return Err(WithdrawalError::Internal(format!(
                "duplicate withdrawal id {}",
                new.withdrawal_id
            )));
        }
        let withdrawal = new.into_pending();
        let pos = inner.rows.len();
        inner.index.insert(withdrawal.withdrawal_id, pos);
        inner.rows.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn get(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        let inner = self.lock()?;
        inner
            .index
            .get(&withdrawal_id)
            .map(|&pos| inner.rows[pos].clone())
            .ok_or(WithdrawalError::NotFound(withdrawal_id))
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Withdrawal>, WithdrawalError> {
        let inner = self.lock()?;
        let mut matching: Vec<&Withdrawal> =
            inner.rows.iter().filter(|w| w.user_id == user_id).collect();
        matching.sort_by_key(|w| Reverse(w.created_at));
        Ok(matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        status: WithdrawalStatus,
        limit: u32,
    ) -> Result<Vec<Withdrawal>, WithdrawalError> {
        let inner = self.lock()?;
        let mut matching: Vec<&Withdrawal> =
            inner.rows.iter().filter(|w| w.status == status).collect();
        matching.sort_by_key(|w| w.created_at);
        Ok(matching
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        withdrawal_id: WithdrawalId,
        event: &WithdrawalEvent,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, WithdrawalError> {
        let mut inner = self.lock()?;
        let pos = *inner
            .index
            .get(&withdrawal_id)
            .ok_or(WithdrawalError::NotFound(withdrawal_id))?;
        let row = &mut inner.rows[pos];
        apply_event(row, event, now)?;
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::withdrawal::error::WithdrawalConflict;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap()
    }

    fn new_withdrawal(user_id: UserId, created_at: DateTime<Utc>) -> NewWithdrawal {
        NewWithdrawal {
            withdrawal_id: WithdrawalId::new(),
            user_id,
            crypto_amount: Decimal::from(50),
            crypto_currency: "USDC".to_string(),
            fee_amount: Decimal::new(5, 1),
            fiat_amount: Decimal::new(4950, 2),
            fiat_currency: "USD".to_string(),
            bank_account_id: "acct-1".to_string(),
            estimated_arrival: created_at + Duration::days(3),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_listing_order_and_ownership() {
        let store = MemoryWithdrawalStore::new();
        let alice = UserId::new();
        let a = store.create(new_withdrawal(alice, t0())).await.unwrap();
        let b = store
            .create(new_withdrawal(alice, t0() + Duration::seconds(5)))
            .await
            .unwrap();
        store.create(new_withdrawal(UserId::new(), t0())).await.unwrap();

        let mine: Vec<_> = store
            .list_for_user(alice, Page::default())
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.withdrawal_id)
            .collect();
        assert_eq!(mine, vec![b.withdrawal_id, a.withdrawal_id]);

        let pending = store
            .list_by_status(WithdrawalStatus::Pending, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending.last().unwrap().withdrawal_id, b.withdrawal_id);
    }

    #[tokio::test]
    async fn test_transition_records_failure_reason() {
        let store = MemoryWithdrawalStore::new();
        let w = store.create(new_withdrawal(UserId::new(), t0())).await.unwrap();
        let later = t0() + Duration::minutes(1);

        let failed = store
            .transition(
                w.withdrawal_id,
                &WithdrawalEvent::Fail {
                    reason: "bank_rejected".to_string(),
                },
                later,
            )
            .await
            .unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("bank_rejected"));
        assert_eq!(failed.updated_at, later);

        let err = store
            .transition(w.withdrawal_id, &WithdrawalEvent::StartProcessing, later)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WithdrawalError::Conflict(WithdrawalConflict::AlreadyFinalized)
        );
    }

    #[tokio::test]
    async fn test_concurrent_reports_have_one_winner() {
        let store = Arc::new(MemoryWithdrawalStore::new());
        let w = store.create(new_withdrawal(UserId::new(), t0())).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = w.withdrawal_id;
            handles.push(tokio::spawn(async move {
                store
                    .transition(id, &WithdrawalEvent::StartProcessing, t0())
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert_eq!(
                    err,
                    WithdrawalError::Conflict(WithdrawalConflict::AlreadyProcessing)
                ),
            }
        }
        assert_eq!(winners, 1);
        let stored = store.get(w.withdrawal_id).await.unwrap();
        assert_eq!(stored.status, WithdrawalStatus::Processing);
    }
}
