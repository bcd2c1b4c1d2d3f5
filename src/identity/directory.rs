use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MutualContact, TelegramProfile, User, UserId};

/// User directory seam.
///
/// Errors are `anyhow` because callers only log or surface them generically.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert or refresh a user keyed by Telegram id.
    ///
    /// A handle can belong to one user only; if another user still holds the
    /// presented handle it is released first.
    async fn upsert_user(&self, profile: TelegramProfile, now: DateTime<Utc>) -> anyhow::Result<User>;

    async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>>;

    /// Resolve a normalized handle to its registered user
    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>>;

    async fn mutual_contacts(&self, user_id: UserId) -> anyhow::Result<Vec<MutualContact>>;

    /// Idempotent: adding an existing contact is a no-op
    async fn add_contact(
        &self,
        user_id: UserId,
        contact_telegram_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}
