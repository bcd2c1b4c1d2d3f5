use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::identity::{AuthenticatedUser, TelegramProfile, User, UserDirectory, UserId};
use crate::transfer::{Clock, TransferService};
use crate::transfer::types::normalize_handle;

type HmacSha256 = Hmac<Sha256>;

/// Key for deriving the Web App secret from the bot token
const WEB_APP_KEY: &[u8] = b"WebAppData";

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // Subject (user_id as string)
    pub telegram_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub exp: usize, // Expiration time (as UTC timestamp)
    pub iat: usize, // Issued at
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Telegram login is not configured")]
    TelegramDisabled,

    #[error("Invalid init data: {0}")]
    MalformedInitData(String),

    #[error("Init data signature mismatch")]
    BadSignature,

    #[error("Init data has expired")]
    Expired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Token error: {0}")]
    Token(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TelegramDisabled => "LOGIN_DISABLED",
            AuthError::MalformedInitData(_) => "INVALID_PARAMETER",
            AuthError::BadSignature | AuthError::Expired | AuthError::InvalidToken => {
                "AUTH_FAILED"
            }
            AuthError::Directory(_) | AuthError::Token(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::TelegramDisabled => 503,
            AuthError::MalformedInitData(_) => 400,
            AuthError::BadSignature | AuthError::Expired | AuthError::InvalidToken => 401,
            AuthError::Directory(_) | AuthError::Token(_) => 500,
        }
    }
}

/// Telegram Web App login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TelegramLoginRequest {
    /// Raw `Telegram.WebApp.initData` query string
    #[schema(example = "query_id=AAH...&user=%7B%22id%22%3A42%7D&auth_date=1714555800&hash=...")]
    pub init_data: String,
}

/// Public view of a registered user
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub telegram_id: String,
    pub telegram_username: Option<String>,
    pub full_name: String,
    pub profile_pic_url: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            telegram_id: user.telegram_id.clone(),
            telegram_username: user.telegram_username.clone(),
            full_name: user.full_name.clone(),
            profile_pic_url: user.profile_pic_url.clone(),
        }
    }
}

/// Auth Response (JWT)
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

/// `user` field of the init data
#[derive(Debug, Deserialize)]
struct WebAppUser {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

impl WebAppUser {
    fn into_profile(self) -> TelegramProfile {
        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        let username = self.username.as_deref().and_then(normalize_handle);
        let full_name = if full_name.is_empty() {
            username
                .clone()
                .unwrap_or_else(|| format!("Telegram user {}", self.id))
        } else {
            full_name
        };

        TelegramProfile {
            telegram_id: self.id.to_string(),
            telegram_username: username,
            full_name,
            profile_pic_url: self.photo_url,
        }
    }
}

/// Auth settings taken from configuration
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub telegram_bot_token: Option<String>,
    pub init_data_max_age: Duration,
}

pub struct UserAuthService {
    settings: AuthSettings,
    users: Arc<dyn UserDirectory>,
    transfers: Arc<TransferService>,
    clock: Arc<dyn Clock>,
}

impl UserAuthService {
    pub fn new(
        settings: AuthSettings,
        users: Arc<dyn UserDirectory>,
        transfers: Arc<TransferService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            users,
            transfers,
            clock,
        }
    }

    /// Log in with Telegram Web App init data and issue a JWT.
    ///
    /// Registers the user on first login and attaches transfers that were
    /// sent to their handle before they joined.
    pub async fn login_with_telegram(&self, init_data: &str) -> Result<AuthResponse, AuthError> {
        let now = self.clock.now();
        let profile = match self.verify_init_data(init_data, now) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(method = "telegram", error = %e, "Failed login");
                return Err(e);
            }
        };

        let user = self
            .users
            .upsert_user(profile, now)
            .await
            .map_err(|e| AuthError::Directory(format!("{:#}", e)))?;

        match self.transfers.on_user_registered(&user).await {
            Ok(_) => {}
            // Login still succeeds; attachment is retried on the next login
            Err(e) => warn!(user_id = %user.user_id, error = %e, "Failed to attach pending transfers"),
        }

        let token = self.issue_token(&user)?;
        info!(user_id = %user.user_id, method = "telegram", "Login");

        Ok(AuthResponse {
            success: true,
            token,
            user: UserProfile::from(&user),
        })
    }

    /// Check the init data HMAC and freshness, then extract the profile.
    pub fn verify_init_data(
        &self,
        init_data: &str,
        now: DateTime<Utc>,
    ) -> Result<TelegramProfile, AuthError> {
        let bot_token = self
            .settings
            .telegram_bot_token
            .as_deref()
            .ok_or(AuthError::TelegramDisabled)?;

        let mut fields = BTreeMap::new();
        let mut hash = None;
        for (key, value) in url::form_urlencoded::parse(init_data.as_bytes()) {
            if key == "hash" {
                hash = Some(value.into_owned());
                continue;
            }
            if fields.insert(key.into_owned(), value.into_owned()).is_some() {
                return Err(AuthError::MalformedInitData("duplicate field".to_string()));
            }
        }

        let hash = hash.ok_or_else(|| AuthError::MalformedInitData("missing hash".to_string()))?;
        let expected = hex::decode(&hash).map_err(|_| AuthError::BadSignature)?;

        let mut mac = init_data_mac(bot_token)?;
        mac.update(data_check_string(&fields).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::BadSignature)?;

        let auth_date = fields
            .get("auth_date")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| AuthError::MalformedInitData("missing auth_date".to_string()))?;
        if now - auth_date > self.settings.init_data_max_age {
            return Err(AuthError::Expired);
        }

        let user_json = fields
            .get("user")
            .ok_or_else(|| AuthError::MalformedInitData("missing user".to_string()))?;
        let user: WebAppUser = serde_json::from_str(user_json)
            .map_err(|e| AuthError::MalformedInitData(format!("user: {}", e)))?;

        Ok(user.into_profile())
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user.user_id.to_string(),
            telegram_id: user.telegram_id.clone(),
            username: user.telegram_username.clone(),
            exp: (now + self.settings.token_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.settings.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?
            .claims;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedUser {
            user_id,
            telegram_id: claims.telegram_id,
            username: claims.username,
        })
    }
}

/// `HMAC-SHA256(secret_key, .)` where
/// `secret_key = HMAC-SHA256("WebAppData", bot_token)`
fn init_data_mac(bot_token: &str) -> Result<HmacSha256, AuthError> {
    let mut secret = HmacSha256::new_from_slice(WEB_APP_KEY)
        .map_err(|e| AuthError::Token(e.to_string()))?;
    secret.update(bot_token.as_bytes());
    let secret_key = secret.finalize().into_bytes();

    HmacSha256::new_from_slice(&secret_key).map_err(|e| AuthError::Token(e.to_string()))
}

/// `key=value` lines sorted by key, joined with `\n`
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build signed init data the way Telegram does. Used by tests and local
/// tooling that has the bot token.
pub fn sign_init_data(bot_token: &str, fields: &[(&str, &str)]) -> Result<String, AuthError> {
    let sorted: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let mut mac = init_data_mac(bot_token)?;
    mac.update(data_check_string(&sorted).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    Ok(serializer.finish())
}
