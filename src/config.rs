use anyhow::{Context, Result, ensure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use chrono::Duration;

use crate::fee::FeeSchedule;
use crate::transfer::TransferLimits;
use crate::user_auth::AuthSettings;
use crate::withdrawal::WithdrawalPolicy;

/// Longest accepted session token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
/// Longest accepted Telegram `initData` age (30 days)
pub const MAX_INIT_DATA_AGE_SECS: i64 = 30 * 86_400;
/// Longest accepted test-transfer cancellation window (one day)
pub const MAX_CANCEL_WINDOW_SECS: i64 = 86_400;
/// Longest accepted payout estimate (90 days)
pub const MAX_ARRIVAL_HOURS: i64 = 90 * 24;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the transfer ledger.
    /// When absent the gateway runs on the in-memory store.
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub transfers: TransferConfig,
    #[serde(default)]
    pub withdrawals: WithdrawalConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Bot token used to verify Telegram Web App `initData`.
    /// Telegram login is disabled when unset.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default = "default_init_data_max_age_secs")]
    pub init_data_max_age_secs: i64,
}

impl AuthConfig {
    pub fn settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: Duration::hours(self.token_ttl_hours),
            telegram_bot_token: self.telegram_bot_token.clone().filter(|t| !t.is_empty()),
            init_data_max_age: Duration::seconds(self.init_data_max_age_secs),
        }
    }
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

fn default_init_data_max_age_secs() -> i64 {
    86_400
}

/// Transfer policy: fee schedule, amount bounds and the test-transfer window.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    pub fee_rate: Decimal,
    pub fee_cap: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub test_min_amount: Decimal,
    pub test_max_amount: Decimal,
    pub cancel_window_secs: i64,
    pub supported_currencies: Vec<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        let limits = TransferLimits::default();
        let fees = FeeSchedule::default();
        Self {
            fee_rate: fees.rate,
            fee_cap: fees.cap,
            min_amount: limits.min,
            max_amount: limits.max,
            test_min_amount: limits.test_min,
            test_max_amount: limits.test_max,
            cancel_window_secs: limits.cancel_window.num_seconds(),
            supported_currencies: limits.supported_currencies,
        }
    }
}

impl TransferConfig {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            rate: self.fee_rate,
            cap: self.fee_cap,
        }
    }

    pub fn limits(&self) -> TransferLimits {
        TransferLimits {
            min: self.min_amount,
            max: self.max_amount,
            test_min: self.test_min_amount,
            test_max: self.test_max_amount,
            cancel_window: chrono::Duration::seconds(self.cancel_window_secs),
            supported_currencies: self
                .supported_currencies
                .iter()
                .map(|c| c.to_uppercase())
                .collect(),
        }
    }
}

/// Fiat cash-out policy. Only currencies listed in `rates` can be withdrawn.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalConfig {
    pub fee_rate: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub fiat_currency: String,
    pub arrival_hours: i64,
    /// Fiat units per unit of each crypto currency
    pub rates: BTreeMap<String, Decimal>,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        let policy = WithdrawalPolicy::default();
        Self {
            fee_rate: policy.fee_rate,
            min_amount: policy.min,
            max_amount: policy.max,
            fiat_currency: policy.fiat_currency,
            arrival_hours: policy.arrival.num_hours(),
            rates: policy.rates,
        }
    }
}

impl WithdrawalConfig {
    pub fn policy(&self) -> WithdrawalPolicy {
        WithdrawalPolicy {
            min: self.min_amount,
            max: self.max_amount,
            fee_rate: self.fee_rate,
            fiat_currency: self.fiat_currency.to_uppercase(),
            rates: self
                .rates
                .iter()
                .map(|(currency, rate)| (currency.to_uppercase(), *rate))
                .collect(),
            arrival: Duration::hours(self.arrival_hours),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SettlementConfig {
    /// Bearer token the settlement worker presents on callback routes.
    /// Callback routes reject every request when unset.
    #[serde(default)]
    pub callback_token: Option<String>,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config: AppConfig =
            serde_yaml::from_str(&content).context("Failed to parse config yaml")?;
        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", config_path))?;
        Ok(config)
    }

    /// Reject values that would break the lifecycle guards or overflow
    /// time arithmetic at runtime.
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        ensure!(
            (1..=MAX_TOKEN_TTL_HOURS).contains(&auth.token_ttl_hours),
            "auth.token_ttl_hours must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_HOURS,
            auth.token_ttl_hours
        );
        ensure!(
            (1..=MAX_INIT_DATA_AGE_SECS).contains(&auth.init_data_max_age_secs),
            "auth.init_data_max_age_secs must be between 1 and {}, got {}",
            MAX_INIT_DATA_AGE_SECS,
            auth.init_data_max_age_secs
        );

        let t = &self.transfers;
        ensure!(
            t.fee_rate >= Decimal::ZERO && t.fee_rate < Decimal::ONE,
            "transfers.fee_rate must be in [0, 1), got {}",
            t.fee_rate
        );
        ensure!(t.fee_cap >= Decimal::ZERO, "transfers.fee_cap must not be negative");
        ensure!(
            t.min_amount > Decimal::ZERO && t.min_amount <= t.max_amount,
            "transfers.min_amount must be positive and at most max_amount ({} > {})",
            t.min_amount,
            t.max_amount
        );
        ensure!(
            t.test_min_amount > Decimal::ZERO && t.test_min_amount <= t.test_max_amount,
            "transfers.test_min_amount must be positive and at most test_max_amount ({} > {})",
            t.test_min_amount,
            t.test_max_amount
        );
        ensure!(
            t.test_max_amount <= t.max_amount,
            "transfers.test_max_amount {} exceeds max_amount {}",
            t.test_max_amount,
            t.max_amount
        );
        ensure!(
            (1..=MAX_CANCEL_WINDOW_SECS).contains(&t.cancel_window_secs),
            "transfers.cancel_window_secs must be between 1 and {}, got {}",
            MAX_CANCEL_WINDOW_SECS,
            t.cancel_window_secs
        );
        ensure!(
            !t.supported_currencies.is_empty(),
            "transfers.supported_currencies must not be empty"
        );

        let w = &self.withdrawals;
        ensure!(
            w.fee_rate >= Decimal::ZERO && w.fee_rate < Decimal::ONE,
            "withdrawals.fee_rate must be in [0, 1), got {}",
            w.fee_rate
        );
        ensure!(
            w.min_amount > Decimal::ZERO && w.min_amount <= w.max_amount,
            "withdrawals.min_amount must be positive and at most max_amount ({} > {})",
            w.min_amount,
            w.max_amount
        );
        ensure!(
            (1..=MAX_ARRIVAL_HOURS).contains(&w.arrival_hours),
            "withdrawals.arrival_hours must be between 1 and {}, got {}",
            MAX_ARRIVAL_HOURS,
            w.arrival_hours
        );
        ensure!(
            !w.fiat_currency.trim().is_empty(),
            "withdrawals.fiat_currency must not be empty"
        );
        for (currency, rate) in &w.rates {
            ensure!(
                *rate > Decimal::ZERO,
                "withdrawals.rates.{} must be positive, got {}",
                currency,
                rate
            );
        }
        Ok(())
    }

    /// Secrets may come from the environment instead of the YAML file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HANDLEPAY_DATABASE_URL") {
            self.postgres_url = Some(url);
        }
        if let Ok(secret) = std::env::var("HANDLEPAY_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(token) = std::env::var("HANDLEPAY_TELEGRAM_BOT_TOKEN") {
            self.auth.telegram_bot_token = Some(token);
        }
        if let Ok(token) = std::env::var("HANDLEPAY_SETTLEMENT_TOKEN") {
            self.settlement.callback_token = Some(token);
        }
    }
}
