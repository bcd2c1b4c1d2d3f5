//! Fee calculation
//!
//! Transfers pay a percentage fee bounded by a cap: `min(amount * rate, cap)`.
//! The default schedule is 0.5% capped at 2.00 of the transfer currency.

use rust_decimal::Decimal;
use thiserror::Error;

/// Fractional digits kept on stored amounts (`NUMERIC(36,18)`).
pub const AMOUNT_SCALE: u32 = 18;

/// Default fee rate (0.5%)
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Default fee cap (2.00)
pub const DEFAULT_FEE_CAP: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Fee computation overflowed")]
    Overflow,
}

/// Percentage fee with an absolute cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub rate: Decimal,
    pub cap: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            rate: DEFAULT_FEE_RATE,
            cap: DEFAULT_FEE_CAP,
        }
    }
}

impl FeeSchedule {
    /// Compute the fee for `amount`.
    ///
    /// The result is rounded to [`AMOUNT_SCALE`] fractional digits so that it
    /// round-trips through the database unchanged.
    pub fn compute(&self, amount: Decimal) -> Result<Decimal, FeeError> {
        if amount <= Decimal::ZERO {
            return Err(FeeError::InvalidAmount);
        }
        let fee = amount.checked_mul(self.rate).ok_or(FeeError::Overflow)?;
        Ok(fee.min(self.cap).round_dp(AMOUNT_SCALE).normalize())
    }
}

/// Compute the fee with the default schedule.
///
/// # Example
/// ```
/// use handlepay::fee::compute_fee;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let fee = compute_fee(Decimal::from_str("3.00").unwrap()).unwrap();
/// assert_eq!(fee, Decimal::from_str("0.015").unwrap());
/// ```
#[inline]
pub fn compute_fee(amount: Decimal) -> Result<Decimal, FeeError> {
    FeeSchedule::default().compute(amount)
}
