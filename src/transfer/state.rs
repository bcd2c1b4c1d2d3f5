//! Transfer Lifecycle State Definitions
//!
//! ```text
//!            ┌──── cancel (test transfer, window open) ───▶ CANCELLED
//!            │
//! PENDING ───┼──── settlement succeeded ─────────────────▶ COMPLETED
//!            │
//!            └──── settlement failed ────────────────────▶ FAILED
//! ```
//!
//! All states other than PENDING are terminal.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::ConflictReason;

/// Transfer status, stored as TEXT in PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Initial state - created, awaiting settlement or cancellation
    Pending,
    /// Terminal: settled on-chain
    Completed,
    /// Terminal: cancelled by the sender inside the test window
    Cancelled,
    /// Terminal: settlement reported failure
    Failed,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Failed => "failed",
        }
    }

    /// Apply `event` to a transfer currently in this state.
    ///
    /// Returns the next state, or the reason the guard rejected the event.
    /// Pure: the caller is responsible for performing the check and the write
    /// atomically.
    pub fn apply(&self, event: &TransferEvent) -> Result<TransferStatus, ConflictReason> {
        if self.is_terminal() {
            return Err(ConflictReason::AlreadyFinalized);
        }
        match event {
            TransferEvent::Cancel {
                now,
                cancellable_until,
            } => match cancellable_until {
                None => Err(ConflictReason::NotCancellable),
                Some(until) if now < until => Ok(TransferStatus::Cancelled),
                Some(_) => Err(ConflictReason::WindowExpired),
            },
            TransferEvent::SettlementSucceeded => Ok(TransferStatus::Completed),
            TransferEvent::SettlementFailed => Ok(TransferStatus::Failed),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            "failed" => Ok(TransferStatus::Failed),
            other => Err(format!("Invalid transfer status: {}", other)),
        }
    }
}

/// Events that drive a transfer out of PENDING.
///
/// The cancel event carries everything its guard needs, so `apply` never has
/// to look anything up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    Cancel {
        now: DateTime<Utc>,
        /// `None` for transfers that are not test transfers
        cancellable_until: Option<DateTime<Utc>>,
    },
    SettlementSucceeded,
    SettlementFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn cancel_at(offset: Duration, until: Option<DateTime<Utc>>) -> TransferEvent {
        TransferEvent::Cancel {
            now: t0() + offset,
            cancellable_until: until,
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransferStatus::Pending.is_terminal());
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Completed,
            TransferStatus::Cancelled,
            TransferStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TransferStatus>(), Ok(status));
        }
        assert!("COMMITTED".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn test_cancel_inside_window() {
        let until = Some(t0() + Duration::minutes(5));
        assert_eq!(
            TransferStatus::Pending.apply(&cancel_at(Duration::seconds(60), until)),
            Ok(TransferStatus::Cancelled)
        );
        assert_eq!(
            TransferStatus::Pending.apply(&cancel_at(
                Duration::minutes(5) - Duration::milliseconds(1),
                until
            )),
            Ok(TransferStatus::Cancelled)
        );
    }

    #[test]
    fn test_cancel_at_or_after_deadline_is_rejected() {
        let until = Some(t0() + Duration::minutes(5));
        assert_eq!(
            TransferStatus::Pending.apply(&cancel_at(Duration::minutes(5), until)),
            Err(ConflictReason::WindowExpired)
        );
        assert_eq!(
            TransferStatus::Pending.apply(&cancel_at(
                Duration::minutes(5) + Duration::milliseconds(1),
                until
            )),
            Err(ConflictReason::WindowExpired)
        );
    }

    #[test]
    fn test_cancel_non_test_transfer() {
        assert_eq!(
            TransferStatus::Pending.apply(&cancel_at(Duration::zero(), None)),
            Err(ConflictReason::NotCancellable)
        );
    }

    #[test]
    fn test_settlement_events() {
        assert_eq!(
            TransferStatus::Pending.apply(&TransferEvent::SettlementSucceeded),
            Ok(TransferStatus::Completed)
        );
        assert_eq!(
            TransferStatus::Pending.apply(&TransferEvent::SettlementFailed),
            Ok(TransferStatus::Failed)
        );
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        let events = [
            cancel_at(Duration::zero(), Some(t0() + Duration::minutes(5))),
            TransferEvent::SettlementSucceeded,
            TransferEvent::SettlementFailed,
        ];
        for status in [
            TransferStatus::Completed,
            TransferStatus::Cancelled,
            TransferStatus::Failed,
        ] {
            for event in &events {
                assert_eq!(
                    status.apply(event),
                    Err(ConflictReason::AlreadyFinalized),
                    "{} must stay terminal",
                    status
                );
            }
        }
    }
}
