//! In-memory transfer store
//!
//! Used when no PostgreSQL URL is configured and throughout the tests. The
//! guard check and the write of every transition happen under one mutex
//! guard, which gives the same single-winner property as the conditional
//! `UPDATE` of the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::error::TransferError;
use super::lifecycle::{Transition, apply_transition};
use super::state::TransferStatus;
use super::store::TransferStore;
use super::types::{FailureReason, NewTransfer, Page, Transfer, TransferId};
use crate::identity::UserId;

#[derive(Default)]
struct Inner {
    /// Insertion order doubles as the listing tie-breaker
    rows: Vec<Transfer>,
    index: HashMap<TransferId, usize>,
}

#[derive(Default)]
pub struct MemoryTransferStore {
    inner: Mutex<Inner>,
}

impl MemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, TransferError> {
        self.inner
            .lock()
            .map_err(|_| TransferError::Internal("transfer store lock poisoned".to_string()))
    }

    fn transition(
        &self,
        transfer_id: TransferId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        let mut inner = self.lock()?;
        let pos = *inner
            .index
            .get(&transfer_id)
            .ok_or(TransferError::NotFound(transfer_id))?;
        let row = &mut inner.rows[pos];
        apply_transition(row, &transition, now)?;
        Ok(row.clone())
    }
}

#[async_trait]
impl TransferStore for MemoryTransferStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new: NewTransfer) -> Result<Transfer, TransferError> {
        let mut inner = self.lock()?;
        if inner.index.contains_key(&new.transfer_id) {
            return Err(TransferError::Internal(format!(
                "duplicate transfer id {}",
                new.transfer_id
            )));
        }
        let transfer = new.into_pending();
        let pos = inner.rows.len();
        inner.index.insert(transfer.transfer_id, pos);
        inner.rows.push(transfer.clone());
        Ok(transfer)
    }

    async fn get(&self, transfer_id: TransferId) -> Result<Transfer, TransferError> {
        let inner = self.lock()?;
        inner
            .index
            .get(&transfer_id)
            .map(|&pos| inner.rows[pos].clone())
            .ok_or(TransferError::NotFound(transfer_id))
    }

    async fn list_for_participant(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError> {
        let inner = self.lock()?;
        let mut matching: Vec<&Transfer> =
            inner.rows.iter().filter(|t| t.involves(user_id)).collect();
        // Stable sort keeps insertion order among equal timestamps
        matching.sort_by_key(|t| Reverse(t.created_at));
        Ok(matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn cancel(
        &self,
        transfer_id: TransferId,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        self.transition(transfer_id, Transition::Cancel, now)
    }

    async fn mark_completed(
        &self,
        transfer_id: TransferId,
        transaction_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        self.transition(
            transfer_id,
            Transition::Complete {
                transaction_ref: transaction_ref.to_string(),
            },
            now,
        )
    }

    async fn mark_failed(
        &self,
        transfer_id: TransferId,
        reason: &FailureReason,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        self.transition(
            transfer_id,
            Transition::Fail {
                reason: reason.clone(),
            },
            now,
        )
    }

    async fn attach_recipient(&self, handle: &str, user_id: UserId) -> Result<u64, TransferError> {
        let mut inner = self.lock()?;
        let mut attached = 0;
        for row in inner
            .rows
            .iter_mut()
            .filter(|t| t.recipient_id.is_none() && t.recipient_handle == handle)
        {
            row.recipient_id = Some(user_id);
            attached += 1;
        }
        Ok(attached)
    }

    async fn list_settleable(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transfer>, TransferError> {
        let inner = self.lock()?;
        let mut pending: Vec<&Transfer> = inner
            .rows
            .iter()
            .filter(|t| t.status == TransferStatus::Pending)
            .filter(|t| t.cancellable_until.is_none_or(|until| until <= now))
            .collect();
        pending.sort_by_key(|t| t.created_at);
        Ok(pending
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
