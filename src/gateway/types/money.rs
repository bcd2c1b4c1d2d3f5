//! Money types for API boundary enforcement
//!
//! - `StrictDecimal`: format-validated amount input
//! - `decimal_string`: amount output, always a JSON string

use rust_decimal::prelude::*;
use serde::Deserialize;

// ============================================================================
// StrictDecimal: Format-Validated Decimal at Serde Layer
// ============================================================================

/// Strict format Decimal - validates format during deserialization
///
/// This type provides format validation at the Serde layer:
/// - Accepts JSON strings only (JSON numbers lose precision)
/// - Rejects `.5` (must be `0.5`)
/// - Rejects `5.` (must be `5.0` or `5`)
/// - Rejects negative numbers
/// - Rejects empty strings
/// - Rejects scientific notation
/// - Rejects more than 18 fractional digits
///
/// Range checks (min/max, zero) happen later in the transfer ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrictDecimal(Decimal);

impl StrictDecimal {
    /// Get the inner Decimal value
    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl std::ops::Deref for StrictDecimal {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;

        if s.is_empty() {
            return Err(D::Error::custom("Amount cannot be empty"));
        }

        // Reject .5 format (must be 0.5)
        if s.starts_with('.') {
            return Err(D::Error::custom("Invalid format: use 0.5 not .5"));
        }

        // Reject 5. format (must be 5.0 or 5)
        if s.ends_with('.') {
            return Err(D::Error::custom("Invalid format: use 5.0 not 5."));
        }

        // Reject scientific notation (1.5e8, 1E10, etc.)
        if s.contains('e') || s.contains('E') {
            return Err(D::Error::custom(
                "Invalid format: scientific notation not allowed",
            ));
        }

        if s.starts_with('+') {
            return Err(D::Error::custom("Invalid format: + prefix not allowed"));
        }

        if s.split_once('.').is_some_and(|(_, frac)| {
            frac.len() > crate::fee::AMOUNT_SCALE as usize
        }) {
            return Err(D::Error::custom(
                "Invalid format: at most 18 fractional digits",
            ));
        }

        let d = Decimal::from_str(&s)
            .map_err(|e| D::Error::custom(format!("Invalid decimal: {}", e)))?;

        if d.is_sign_negative() {
            return Err(D::Error::custom("Amount cannot be negative"));
        }

        Ok(StrictDecimal(d))
    }
}

/// Render an amount for API output: trailing zeros dropped, so `3.00`
/// stored as `NUMERIC(36,18)` reads back as `"3"`.
pub fn decimal_string(d: Decimal) -> String {
    d.normalize().to_string()
}
