//! Withdrawal Core Types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::WithdrawalError;
use super::state::WithdrawalStatus;
use crate::fee::AMOUNT_SCALE;
use crate::identity::UserId;

/// Fiat amounts are paid out in cents
pub const FIAT_SCALE: u32 = 2;

pub const MAX_BANK_ACCOUNT_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalId(Uuid);

impl WithdrawalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for WithdrawalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WithdrawalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Crypto-to-bank cash-out
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub withdrawal_id: WithdrawalId,
    pub user_id: UserId,
    pub crypto_amount: Decimal,
    pub crypto_currency: String,
    pub fee_amount: Decimal,
    pub fiat_amount: Decimal,
    pub fiat_currency: String,
    pub bank_account_id: String,
    pub status: WithdrawalStatus,
    pub failure_reason: Option<String>,
    pub estimated_arrival: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawal {
    pub withdrawal_id: WithdrawalId,
    pub user_id: UserId,
    pub crypto_amount: Decimal,
    pub crypto_currency: String,
    pub fee_amount: Decimal,
    pub fiat_amount: Decimal,
    pub fiat_currency: String,
    pub bank_account_id: String,
    pub estimated_arrival: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewWithdrawal {
    pub fn into_pending(self) -> Withdrawal {
        Withdrawal {
            withdrawal_id: self.withdrawal_id,
            user_id: self.user_id,
            crypto_amount: self.crypto_amount,
            crypto_currency: self.crypto_currency,
            fee_amount: self.fee_amount,
            fiat_amount: self.fiat_amount,
            fiat_currency: self.fiat_currency,
            bank_account_id: self.bank_account_id,
            status: WithdrawalStatus::Pending,
            failure_reason: None,
            estimated_arrival: self.estimated_arrival,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Fee and fiat proceeds of a cash-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub fee_amount: Decimal,
    pub fiat_amount: Decimal,
}

/// Cash-out policy: bounds, fee, conversion rates and payout delay.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalPolicy {
    pub min: Decimal,
    pub max: Decimal,
    /// Fraction of the crypto amount kept as fee (1% by default)
    pub fee_rate: Decimal,
    pub fiat_currency: String,
    /// Fiat units per unit of crypto, keyed by uppercase currency code.
    /// Currencies without a rate cannot be cashed out.
    pub rates: BTreeMap<String, Decimal>,
    pub arrival: Duration,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            min: Decimal::ONE,
            max: Decimal::from(10_000),
            fee_rate: Decimal::new(1, 2),
            fiat_currency: "USD".to_string(),
            rates: [("USDC", Decimal::ONE), ("DAI", Decimal::ONE)]
                .into_iter()
                .map(|(c, r)| (c.to_string(), r))
                .collect(),
            arrival: Duration::days(3),
        }
    }
}

impl WithdrawalPolicy {
    /// Price a cash-out of `amount` of `currency` (already uppercase).
    ///
    /// `fiat = (amount - fee) * rate`, truncated to cents.
    pub fn quote(&self, amount: Decimal, currency: &str) -> Result<Quote, WithdrawalError> {
        let rate = self
            .rates
            .get(currency)
            .copied()
            .ok_or_else(|| WithdrawalError::UnsupportedCurrency(currency.to_string()))?;

        if amount <= Decimal::ZERO {
            return Err(WithdrawalError::InvalidAmount);
        }
        if amount < self.min || amount > self.max {
            return Err(WithdrawalError::AmountOutOfRange {
                min: self.min,
                max: self.max,
            });
        }

        let overflow = || WithdrawalError::InvalidParameter("amount too large".to_string());
        let fee_amount = amount
            .checked_mul(self.fee_rate)
            .ok_or_else(overflow)?
            .round_dp(AMOUNT_SCALE)
            .normalize();
        let fiat_amount = (amount - fee_amount)
            .checked_mul(rate)
            .ok_or_else(overflow)?
            .round_dp_with_strategy(FIAT_SCALE, RoundingStrategy::ToZero);

        Ok(Quote {
            fee_amount,
            fiat_amount,
        })
    }
}

/// Trim a bank account reference; `None` if empty or too long.
pub fn normalize_bank_account(raw: &str) -> Option<String> {
    let account = raw.trim();
    if account.is_empty() || account.chars().count() > MAX_BANK_ACCOUNT_LEN {
        return None;
    }
    Some(account.to_string())
}
