//! Identity Directory
//!
//! Registered users keyed by their Telegram identity. The directory resolves
//! recipient handles to users and keeps each user's mutual contacts.
//!
//! - [`UserDirectory`]: persistence seam, PostgreSQL or in-memory
//! - [`AuthenticatedUser`]: identity proven by a verified bearer token

pub mod db;
pub mod directory;
pub mod memory;

pub use db::PgUserDirectory;
pub use directory::UserDirectory;
pub use memory::MemoryUserDirectory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Registered user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
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

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Registered user
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: UserId,
    pub telegram_id: String,
    /// Normalized handle (lowercase, no `@`)
    pub telegram_username: Option<String>,
    pub full_name: String,
    pub profile_pic_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Profile data presented at login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramProfile {
    pub telegram_id: String,
    pub telegram_username: Option<String>,
    pub full_name: String,
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutualContact {
    pub user_id: UserId,
    pub contact_telegram_id: String,
    pub created_at: DateTime<Utc>,
}

/// Identity established once at the API boundary from a verified token.
///
/// Passed explicitly into every service call; never re-derived deeper down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub telegram_id: String,
    pub username: Option<String>,
}
