use std::sync::Arc;

use crate::db::Database;
use crate::identity::UserDirectory;
use crate::transfer::TransferService;
use crate::user_auth::UserAuthService;
use crate::withdrawal::WithdrawalService;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub transfers: Arc<TransferService>,
    pub users: Arc<dyn UserDirectory>,
    pub user_auth: Arc<UserAuthService>,
    pub withdrawals: Arc<WithdrawalService>,
    /// PostgreSQL pool owner; `None` when running on the in-memory stores
    pub db: Option<Arc<Database>>,
    /// Bearer token the settlement worker presents; settlement routes are
    /// closed when unset
    pub settlement_token: Option<String>,
}

impl AppState {
    pub fn new(
        transfers: Arc<TransferService>,
        users: Arc<dyn UserDirectory>,
        user_auth: Arc<UserAuthService>,
        withdrawals: Arc<WithdrawalService>,
    ) -> Self {
        Self {
            transfers,
            users,
            user_auth,
            withdrawals,
            db: None,
            settlement_token: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_settlement_token(mut self, token: Option<String>) -> Self {
        self.settlement_token = token.filter(|t| !t.is_empty());
        self
    }
}
