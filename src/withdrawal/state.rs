//! Withdrawal state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::WithdrawalConflict;

/// Withdrawal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Requested, not yet picked up by the payout processor
    Pending,
    /// Payout processor has started the bank transfer
    Processing,
    /// Funds sent to the bank
    Completed,
    /// Payout rejected or failed
    Failed,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    /// Next state for `event`, or why the guard rejected it.
    pub fn apply(&self, event: &WithdrawalEvent) -> Result<WithdrawalStatus, WithdrawalConflict> {
        if self.is_terminal() {
            return Err(WithdrawalConflict::AlreadyFinalized);
        }
        match (self, event) {
            (WithdrawalStatus::Pending, WithdrawalEvent::StartProcessing) => {
                Ok(WithdrawalStatus::Processing)
            }
            (WithdrawalStatus::Processing, WithdrawalEvent::StartProcessing) => {
                Err(WithdrawalConflict::AlreadyProcessing)
            }
            (WithdrawalStatus::Processing, WithdrawalEvent::Complete) => {
                Ok(WithdrawalStatus::Completed)
            }
            (WithdrawalStatus::Pending, WithdrawalEvent::Complete) => {
                Err(WithdrawalConflict::NotProcessing)
            }
            (_, WithdrawalEvent::Fail { .. }) => Ok(WithdrawalStatus::Failed),
            // Terminal states returned above
            (_, _) => Err(WithdrawalConflict::AlreadyFinalized),
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "processing" => Ok(WithdrawalStatus::Processing),
            "completed" => Ok(WithdrawalStatus::Completed),
            "failed" => Ok(WithdrawalStatus::Failed),
            other => Err(format!("Invalid withdrawal status: {}", other)),
        }
    }
}

/// Payout processor reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalEvent {
    StartProcessing,
    Complete,
    Fail { reason: String },
}

impl WithdrawalEvent {
    /// Statuses from which the event is accepted.
    ///
    /// The PostgreSQL store puts these in the `WHERE` clause of its
    /// conditional update; they must agree with [`WithdrawalStatus::apply`].
    pub fn sources(&self) -> &'static [WithdrawalStatus] {
        match self {
            WithdrawalEvent::StartProcessing => &[WithdrawalStatus::Pending],
            WithdrawalEvent::Complete => &[WithdrawalStatus::Processing],
            WithdrawalEvent::Fail { .. } => {
                &[WithdrawalStatus::Pending, WithdrawalStatus::Processing]
            }
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            WithdrawalEvent::StartProcessing => "processing",
            WithdrawalEvent::Complete => "completed",
            WithdrawalEvent::Fail { .. } => "failed",
        }
    }
}
