//! Withdrawal Database Layer
//!
//! Status reports from the payout processor are applied with one
//! conditional `UPDATE ... WHERE status = ANY(...) RETURNING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::WithdrawalError;
use super::state::{WithdrawalEvent, WithdrawalStatus};
use super::store::{WithdrawalStore, rejection};
use super::types::{NewWithdrawal, Withdrawal, WithdrawalId};
use crate::identity::UserId;
use crate::transfer::Page;

macro_rules! withdrawal_columns {
    () => {
        "withdrawal_id, user_id, crypto_amount, crypto_currency, fee_amount, fiat_amount, \
         fiat_currency, bank_account_id, status, failure_reason, estimated_arrival, \
         created_at, updated_at"
    };
}

pub struct PgWithdrawalStore {
    pool: PgPool,
}

impl PgWithdrawalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_withdrawal(row: &PgRow) -> Result<Withdrawal, WithdrawalError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<WithdrawalStatus>()
        .map_err(WithdrawalError::Internal)?;

    Ok(Withdrawal {
        withdrawal_id: WithdrawalId::from_uuid(row.try_get("withdrawal_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        crypto_amount: row.try_get("crypto_amount")?,
        crypto_currency: row.try_get("crypto_currency")?,
        fee_amount: row.try_get("fee_amount")?,
        fiat_amount: row.try_get("fiat_amount")?,
        fiat_currency: row.try_get("fiat_currency")?,
        bank_account_id: row.try_get("bank_account_id")?,
        status,
        failure_reason: row.try_get("failure_reason")?,
        estimated_arrival: row.try_get("estimated_arrival")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl WithdrawalStore for PgWithdrawalStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, new: NewWithdrawal) -> Result<Withdrawal, WithdrawalError> {
        let row = sqlx::query(concat!(
            "INSERT INTO fiat_withdrawals (withdrawal_id, user_id, crypto_amount, \
             crypto_currency, fee_amount, fiat_amount, fiat_currency, bank_account_id, \
             status, estimated_arrival, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING ",
            withdrawal_columns!()
        ))
        .bind(new.withdrawal_id.inner())
        .bind(new.user_id.inner())
        .bind(new.crypto_amount)
        .bind(&new.crypto_currency)
        .bind(new.fee_amount)
        .bind(new.fiat_amount)
        .bind(&new.fiat_currency)
        .bind(&new.bank_account_id)
        .bind(WithdrawalStatus::Pending.as_str())
        .bind(new.estimated_arrival)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_withdrawal(&row)
    }

    async fn get(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            withdrawal_columns!(),
            " FROM fiat_withdrawals WHERE withdrawal_id = $1"
        ))
        .bind(withdrawal_id.inner())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_withdrawal(&row),
            None => Err(WithdrawalError::NotFound(withdrawal_id)),
        }
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Withdrawal>, WithdrawalError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            withdrawal_columns!(),
            " FROM fiat_withdrawals WHERE user_id = $1 \
             ORDER BY created_at DESC, seq ASC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.inner())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_withdrawal).collect()
    }

    async fn list_by_status(
        &self,
        status: WithdrawalStatus,
        limit: u32,
    ) -> Result<Vec<Withdrawal>, WithdrawalError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            withdrawal_columns!(),
            " FROM fiat_withdrawals WHERE status = $1 \
             ORDER BY created_at ASC, seq ASC LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_withdrawal).collect()
    }

    async fn transition(
        &self,
        withdrawal_id: WithdrawalId,
        event: &WithdrawalEvent,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, WithdrawalError> {
        let target = match event {
            WithdrawalEvent::StartProcessing => WithdrawalStatus::Processing,
            WithdrawalEvent::Complete => WithdrawalStatus::Completed,
            WithdrawalEvent::Fail { .. } => WithdrawalStatus::Failed,
        };
        let failure_reason = match event {
            WithdrawalEvent::Fail { reason } => Some(reason.as_str()),
            _ => None,
        };
        let sources: Vec<&str> = event.sources().iter().map(|s| s.as_str()).collect();

        let row = sqlx::query(concat!(
            "UPDATE fiat_withdrawals SET status = $2, updated_at = $3, \
             failure_reason = COALESCE($4, failure_reason) \
             WHERE withdrawal_id = $1 AND status = ANY($5) RETURNING ",
            withdrawal_columns!()
        ))
        .bind(withdrawal_id.inner())
        .bind(target.as_str())
        .bind(now)
        .bind(failure_reason)
        .bind(&sources)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_withdrawal(&row),
            None => match self.get(withdrawal_id).await {
                Ok(current) => Err(rejection(&current, event)),
                Err(e) => Err(e),
            },
        }
    }
}
