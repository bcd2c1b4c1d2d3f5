//! handlepay - send crypto to a Telegram username
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌─────────────────┐    ┌──────────────┐
//! │  Config  │───▶│   Gateway    │───▶│ TransferService │───▶│TransferLedger│
//! │  (YAML)  │    │ (axum + JWT) │    │ (identity)      │    │ (PG / memory)│
//! └──────────┘    └──────┬───────┘    └─────────────────┘    └──────────────┘
//!                        │            ┌─────────────────┐    ┌──────────────┐
//!                        └───────────▶│WithdrawalService│───▶│ (PG / memory)│
//!                                     └─────────────────┘    └──────────────┘
//! ```
//!
//! Usage: `handlepay [--env dev] [--port 8080]`

use anyhow::{Context, bail};
use std::sync::Arc;

use handlepay::config::AppConfig;
use handlepay::db::Database;
use handlepay::gateway::{self, state::AppState};
use handlepay::identity::{MemoryUserDirectory, PgUserDirectory, UserDirectory};
use handlepay::transfer::{
    Clock, MemoryTransferStore, PgTransferStore, SystemClock, TransferLedger, TransferService,
    TransferStore,
};
use handlepay::user_auth::UserAuthService;
use handlepay::withdrawal::{
    MemoryWithdrawalStore, PgWithdrawalStore, WithdrawalService, WithdrawalStore,
};

/// Storage backends chosen at startup
struct Stores {
    db: Option<Arc<Database>>,
    transfers: Arc<dyn TransferStore>,
    withdrawals: Arc<dyn WithdrawalStore>,
    users: Arc<dyn UserDirectory>,
}

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = handlepay::logging::init_logging(&app_config);

    tracing::info!("Starting handlepay in {} mode", env);

    if app_config.auth.jwt_secret.trim().is_empty() {
        bail!("auth.jwt_secret is empty; set it in config or HANDLEPAY_JWT_SECRET");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let stores = match app_config.postgres_url.as_deref() {
        Some(url) => {
            let db = Arc::new(
                Database::connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            );
            db.init_schema()
                .await
                .context("Failed to initialize schema")?;
            let pool = db.pool().clone();
            Stores {
                db: Some(db),
                transfers: Arc::new(PgTransferStore::new(pool.clone())),
                withdrawals: Arc::new(PgWithdrawalStore::new(pool.clone())),
                users: Arc::new(PgUserDirectory::new(pool)),
            }
        }
        None => {
            tracing::warn!(
                "postgres_url not set; transfers and withdrawals are kept in memory and lost on exit"
            );
            Stores {
                db: None,
                transfers: Arc::new(MemoryTransferStore::new()),
                withdrawals: Arc::new(MemoryWithdrawalStore::new()),
                users: Arc::new(MemoryUserDirectory::new()),
            }
        }
    };
    let Stores {
        db,
        transfers: transfer_store,
        withdrawals: withdrawal_store,
        users,
    } = stores;

    let ledger = Arc::new(TransferLedger::new(
        transfer_store,
        clock.clone(),
        app_config.transfers.fee_schedule(),
        app_config.transfers.limits(),
    ));
    let transfers = Arc::new(TransferService::new(ledger, users.clone()));
    let withdrawals = Arc::new(WithdrawalService::new(
        withdrawal_store,
        clock.clone(),
        app_config.withdrawals.policy(),
    ));
    tracing::info!(store = withdrawals.store_name(), "Withdrawals ready");

    let auth_settings = app_config.auth.settings();
    if auth_settings.telegram_bot_token.is_none() {
        tracing::warn!("telegram_bot_token not set; Telegram login is disabled");
    }
    let user_auth = Arc::new(UserAuthService::new(
        auth_settings,
        users.clone(),
        transfers.clone(),
        clock,
    ));

    if app_config.settlement.callback_token.is_none() {
        tracing::warn!("settlement.callback_token not set; settlement callbacks are disabled");
    }

    let mut state = AppState::new(transfers, users, user_auth, withdrawals)
        .with_settlement_token(app_config.settlement.callback_token.clone());
    if let Some(db) = db.clone() {
        state = state.with_database(db);
    }

    gateway::run_server(&app_config.gateway, Arc::new(state)).await?;

    if let Some(db) = db {
        db.close().await;
    }
    Ok(())
}
