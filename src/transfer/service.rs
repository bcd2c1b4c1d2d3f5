//! Transfer Service
//!
//! The surface used by the gateway: every user-facing call takes the
//! [`AuthenticatedUser`] established at the HTTP boundary, settlement
//! callbacks take none (they are authenticated separately).

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::TransferError;
use super::lifecycle::TransferLedger;
use super::types::{FailureReason, Page, Transfer, TransferId, normalize_handle};
use crate::identity::{AuthenticatedUser, User, UserDirectory};

/// Request to send `amount` of `currency` to a handle
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTransfer {
    pub recipient_handle: String,
    pub amount: Decimal,
    pub currency: String,
    pub is_test: bool,
}

pub struct TransferService {
    ledger: Arc<TransferLedger>,
    users: Arc<dyn UserDirectory>,
}

impl TransferService {
    pub fn new(ledger: Arc<TransferLedger>, users: Arc<dyn UserDirectory>) -> Self {
        Self { ledger, users }
    }

    pub fn ledger(&self) -> &Arc<TransferLedger> {
        &self.ledger
    }

    /// Create a PENDING transfer from `identity` to the named handle.
    ///
    /// The recipient stays unresolved (`recipient_id = None`) when nobody
    /// holds the handle yet; it is attached when they register.
    pub async fn create_transfer(
        &self,
        identity: &AuthenticatedUser,
        req: CreateTransfer,
    ) -> Result<Transfer, TransferError> {
        let handle = normalize_handle(&req.recipient_handle).ok_or(TransferError::InvalidRecipient)?;

        let own_handle = identity.username.as_deref().and_then(normalize_handle);
        if own_handle.as_deref() == Some(handle.as_str()) {
            return Err(TransferError::SelfTransfer);
        }

        let recipient = self
            .users
            .find_by_handle(&handle)
            .await
            .map_err(|e| TransferError::Persistence(format!("resolve recipient: {:#}", e)))?;

        let recipient_id = match recipient {
            Some(user) if user.user_id == identity.user_id => return Err(TransferError::SelfTransfer),
            Some(user) => Some(user.user_id),
            None => {
                debug!(handle = %handle, "Recipient not registered yet");
                None
            }
        };

        self.ledger
            .create(
                Some(identity.user_id),
                recipient_id,
                &handle,
                req.amount,
                &req.currency,
                req.is_test,
            )
            .await
    }

    /// Cancel a test transfer. Only the sender may cancel, and the check
    /// happens before the lifecycle guard.
    pub async fn cancel_transfer(
        &self,
        identity: &AuthenticatedUser,
        transfer_id: TransferId,
    ) -> Result<Transfer, TransferError> {
        let transfer = self.ledger.get(transfer_id).await?;
        if transfer.sender_id != Some(identity.user_id) {
            warn!(
                transfer_id = %transfer_id,
                user_id = %identity.user_id,
                "Cancel attempted by non-sender"
            );
            return Err(TransferError::Forbidden);
        }
        self.ledger.cancel(transfer_id).await
    }

    /// Transfers `identity` sent or received, newest first
    pub async fn list_transfers(
        &self,
        identity: &AuthenticatedUser,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError> {
        self.ledger.list_for_participant(identity.user_id, page).await
    }

    pub async fn get_transfer(
        &self,
        identity: &AuthenticatedUser,
        transfer_id: TransferId,
    ) -> Result<Transfer, TransferError> {
        let transfer = self.ledger.get(transfer_id).await?;
        if !transfer.involves(identity.user_id) {
            return Err(TransferError::Forbidden);
        }
        Ok(transfer)
    }

    pub async fn settle_completed(
        &self,
        transfer_id: TransferId,
        transaction_ref: &str,
    ) -> Result<Transfer, TransferError> {
        self.ledger.mark_completed(transfer_id, transaction_ref.trim()).await
    }

    pub async fn settle_failed(
        &self,
        transfer_id: TransferId,
        reason: FailureReason,
    ) -> Result<Transfer, TransferError> {
        self.ledger.mark_failed(transfer_id, reason).await
    }

    pub async fn pending_settlements(&self, limit: u32) -> Result<Vec<Transfer>, TransferError> {
        self.ledger.list_settleable(limit).await
    }

    /// Attach transfers that were sent to `user`'s handle before they
    /// registered. Returns how many were attached.
    pub async fn on_user_registered(&self, user: &User) -> Result<u64, TransferError> {
        match user.telegram_username.as_deref() {
            Some(handle) => self.ledger.attach_recipient(handle, user.user_id).await,
            None => Ok(0),
        }
    }
}
