//! PostgreSQL schema
//!
//! Idempotent DDL applied at startup. Amounts are `NUMERIC(36,18)`.

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id UUID PRIMARY KEY,
    telegram_id TEXT UNIQUE NOT NULL,
    telegram_username TEXT UNIQUE,
    profile_pic_url TEXT,
    full_name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_active_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSFERS: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    seq BIGSERIAL UNIQUE,
    transfer_id UUID PRIMARY KEY,
    sender_id UUID REFERENCES users(user_id),
    recipient_id UUID REFERENCES users(user_id),
    recipient_handle TEXT NOT NULL,
    amount NUMERIC(36,18) NOT NULL CHECK (amount > 0),
    currency TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'completed', 'cancelled', 'failed')),
    is_test_transfer BOOLEAN NOT NULL DEFAULT FALSE,
    cancellable_until TIMESTAMPTZ,
    transaction_ref TEXT,
    failure_reason TEXT,
    fee_amount NUMERIC(36,18) NOT NULL CHECK (fee_amount >= 0),
    created_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    CONSTRAINT transfers_window_only_for_tests
        CHECK (is_test_transfer = (cancellable_until IS NOT NULL)),
    CONSTRAINT transfers_completed_at_iff_terminal
        CHECK ((status = 'pending') = (completed_at IS NULL))
)
"#;

pub const CREATE_MUTUAL_CONTACTS: &str = r#"
CREATE TABLE IF NOT EXISTS mutual_contacts (
    user_id UUID REFERENCES users(user_id) ON DELETE CASCADE,
    contact_telegram_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, contact_telegram_id)
)
"#;

pub const CREATE_FIAT_WITHDRAWALS: &str = r#"
CREATE TABLE IF NOT EXISTS fiat_withdrawals (
    seq BIGSERIAL UNIQUE,
    withdrawal_id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(user_id),
    crypto_amount NUMERIC(36,18) NOT NULL CHECK (crypto_amount > 0),
    crypto_currency TEXT NOT NULL,
    fee_amount NUMERIC(36,18) NOT NULL CHECK (fee_amount >= 0),
    fiat_amount NUMERIC(36,18) NOT NULL CHECK (fiat_amount >= 0),
    fiat_currency TEXT NOT NULL,
    bank_account_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    failure_reason TEXT,
    estimated_arrival TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT fiat_withdrawals_reason_iff_failed
        CHECK ((status = 'failed') = (failure_reason IS NOT NULL))
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_transfers_sender_id ON transfers(sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_recipient_id ON transfers(recipient_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_recipient_handle ON transfers(recipient_handle) WHERE recipient_id IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_transfers_status ON transfers(status)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_created_at ON transfers(created_at DESC, seq)",
    "CREATE INDEX IF NOT EXISTS idx_fiat_withdrawals_user_id ON fiat_withdrawals(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_fiat_withdrawals_status ON fiat_withdrawals(status, created_at)",
];

/// All statements in dependency order
pub fn statements() -> impl Iterator<Item = &'static str> {
    [
        CREATE_USERS,
        CREATE_TRANSFERS,
        CREATE_MUTUAL_CONTACTS,
        CREATE_FIAT_WITHDRAWALS,
    ]
        .into_iter()
        .chain(CREATE_INDEXES.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_precede_indexes() {
        let stmts: Vec<_> = statements().collect();
        assert_eq!(stmts.len(), 4 + CREATE_INDEXES.len());
        assert!(stmts[0].contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(stmts[1].contains("CREATE TABLE IF NOT EXISTS transfers"));
        assert!(stmts[3].contains("CREATE TABLE IF NOT EXISTS fiat_withdrawals"));
        assert!(stmts[4..].iter().all(|s| s.starts_with("CREATE INDEX")));
    }

    #[test]
    fn test_transfers_enforce_lifecycle_invariants() {
        assert!(CREATE_TRANSFERS.contains("is_test_transfer = (cancellable_until IS NOT NULL)"));
        assert!(CREATE_TRANSFERS.contains("(status = 'pending') = (completed_at IS NULL)"));
        assert!(CREATE_TRANSFERS.contains("NUMERIC(36,18)"));
    }

    #[test]
    fn test_withdrawals_record_reason_only_when_failed() {
        assert!(CREATE_FIAT_WITHDRAWALS.contains("REFERENCES users(user_id)"));
        assert!(
            CREATE_FIAT_WITHDRAWALS.contains("(status = 'failed') = (failure_reason IS NOT NULL)")
        );
        assert!(CREATE_FIAT_WITHDRAWALS.contains("'processing'"));
    }
}
