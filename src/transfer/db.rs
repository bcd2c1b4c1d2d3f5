//! Transfer Database Layer
//!
//! PostgreSQL-based persistence for the transfer ledger.
//! All status updates are atomic conditional `UPDATE ... RETURNING`
//! statements; a statement that matches no row is a lost race or a failed
//! guard, never a partial write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::TransferError;
use super::lifecycle::{Transition, rejection};
use super::state::TransferStatus;
use super::store::TransferStore;
use super::types::{FailureReason, NewTransfer, Page, Transfer, TransferId};
use crate::identity::UserId;

macro_rules! transfer_columns {
    () => {
        "transfer_id, sender_id, recipient_id, recipient_handle, amount, currency, \
         status, is_test_transfer, cancellable_until, transaction_ref, failure_reason, \
         fee_amount, created_at, completed_at"
    };
}

/// Transfer database operations
pub struct PgTransferStore {
    pool: PgPool,
}

impl PgTransferStore {
    /// Create a new PgTransferStore with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-read the row after a conditional update matched nothing.
    async fn explain_miss(
        &self,
        transfer_id: TransferId,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> TransferError {
        match self.get(transfer_id).await {
            Ok(current) => rejection(&current, transition, now),
            Err(e) => e,
        }
    }
}

/// Convert database row to Transfer
fn row_to_transfer(row: &PgRow) -> Result<Transfer, TransferError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<TransferStatus>()
        .map_err(TransferError::Internal)?;

    let failure_reason: Option<String> = row.try_get("failure_reason")?;

    Ok(Transfer {
        transfer_id: TransferId::from_uuid(row.try_get("transfer_id")?),
        sender_id: row
            .try_get::<Option<Uuid>, _>("sender_id")?
            .map(UserId::from_uuid),
        recipient_id: row
            .try_get::<Option<Uuid>, _>("recipient_id")?
            .map(UserId::from_uuid),
        recipient_handle: row.try_get("recipient_handle")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        fee_amount: row.try_get("fee_amount")?,
        status,
        is_test_transfer: row.try_get("is_test_transfer")?,
        cancellable_until: row.try_get("cancellable_until")?,
        transaction_ref: row.try_get("transaction_ref")?,
        failure_reason: failure_reason.as_deref().map(FailureReason::from_code),
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl TransferStore for PgTransferStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, new: NewTransfer) -> Result<Transfer, TransferError> {
        let row = sqlx::query(concat!(
            "INSERT INTO transfers (transfer_id, sender_id, recipient_id, recipient_handle, \
             amount, currency, status, is_test_transfer, cancellable_until, fee_amount, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING ",
            transfer_columns!()
        ))
        .bind(new.transfer_id.inner())
        .bind(new.sender_id.map(|u| u.inner()))
        .bind(new.recipient_id.map(|u| u.inner()))
        .bind(&new.recipient_handle)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(TransferStatus::Pending.as_str())
        .bind(new.is_test_transfer)
        .bind(new.cancellable_until)
        .bind(new.fee_amount)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_transfer(&row)
    }

    async fn get(&self, transfer_id: TransferId) -> Result<Transfer, TransferError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            transfer_columns!(),
            " FROM transfers WHERE transfer_id = $1"
        ))
        .bind(transfer_id.inner())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(TransferError::NotFound(transfer_id)),
        }
    }

    async fn list_for_participant(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transfer>, TransferError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            transfer_columns!(),
            " FROM transfers WHERE sender_id = $1 OR recipient_id = $1 \
             ORDER BY created_at DESC, seq ASC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.inner())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }

    async fn cancel(
        &self,
        transfer_id: TransferId,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        let row = sqlx::query(concat!(
            "UPDATE transfers SET status = $3, completed_at = $2 \
             WHERE transfer_id = $1 AND status = $4 AND is_test_transfer \
             AND cancellable_until > $2 RETURNING ",
            transfer_columns!()
        ))
        .bind(transfer_id.inner())
        .bind(now)
        .bind(TransferStatus::Cancelled.as_str())
        .bind(TransferStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(self
                .explain_miss(transfer_id, &Transition::Cancel, now)
                .await),
        }
    }

    async fn mark_completed(
        &self,
        transfer_id: TransferId,
        transaction_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        let row = sqlx::query(concat!(
            "UPDATE transfers SET status = $3, completed_at = $2, transaction_ref = $5 \
             WHERE transfer_id = $1 AND status = $4 RETURNING ",
            transfer_columns!()
        ))
        .bind(transfer_id.inner())
        .bind(now)
        .bind(TransferStatus::Completed.as_str())
        .bind(TransferStatus::Pending.as_str())
        .bind(transaction_ref)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => {
                let transition = Transition::Complete {
                    transaction_ref: transaction_ref.to_string(),
                };
                Err(self.explain_miss(transfer_id, &transition, now).await)
            }
        }
    }

    async fn mark_failed(
        &self,
        transfer_id: TransferId,
        reason: &FailureReason,
        now: DateTime<Utc>,
    ) -> Result<Transfer, TransferError> {
        let row = sqlx::query(concat!(
            "UPDATE transfers SET status = $3, completed_at = $2, failure_reason = $5 \
             WHERE transfer_id = $1 AND status = $4 RETURNING ",
            transfer_columns!()
        ))
        .bind(transfer_id.inner())
        .bind(now)
        .bind(TransferStatus::Failed.as_str())
        .bind(TransferStatus::Pending.as_str())
        .bind(reason.as_code())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => {
                let transition = Transition::Fail {
                    reason: reason.clone(),
                };
                Err(self.explain_miss(transfer_id, &transition, now).await)
            }
        }
    }

    async fn attach_recipient(&self, handle: &str, user_id: UserId) -> Result<u64, TransferError> {
        let result = sqlx::query(
            "UPDATE transfers SET recipient_id = $2 \
             WHERE recipient_id IS NULL AND recipient_handle = $1",
        )
        .bind(handle)
        .bind(user_id.inner())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_settleable(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transfer>, TransferError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            transfer_columns!(),
            " FROM transfers WHERE status = $1 \
             AND (cancellable_until IS NULL OR cancellable_until <= $2) \
             ORDER BY created_at ASC, seq ASC LIMIT $3"
        ))
        .bind(TransferStatus::Pending.as_str())
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }
}
