use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::directory::UserDirectory;
use super::{MutualContact, TelegramProfile, User, UserId};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    by_telegram_id: HashMap<String, UserId>,
    contacts: Vec<MutualContact>,
}

/// In-memory user directory
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: Mutex<Inner>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("user directory lock poisoned"))
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn upsert_user(&self, profile: TelegramProfile, now: DateTime<Utc>) -> anyhow::Result<User> {
        let mut inner = self.lock()?;

        if let Some(handle) = &profile.telegram_username {
            for user in inner.users.values_mut() {
                if user.telegram_id != profile.telegram_id
                    && user.telegram_username.as_deref() == Some(handle.as_str())
                {
                    user.telegram_username = None;
                }
            }
        }

        let existing = inner.by_telegram_id.get(&profile.telegram_id).copied();
        let user = match existing {
            Some(user_id) => {
                let user = inner
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| anyhow!("telegram index points at missing user {}", user_id))?;
                user.telegram_username = profile.telegram_username;
                user.full_name = profile.full_name;
                user.profile_pic_url = profile.profile_pic_url;
                user.last_active_at = now;
                user.clone()
            }
            None => {
                let user = User {
                    user_id: UserId::new(),
                    telegram_id: profile.telegram_id.clone(),
                    telegram_username: profile.telegram_username,
                    full_name: profile.full_name,
                    profile_pic_url: profile.profile_pic_url,
                    created_at: now,
                    last_active_at: now,
                };
                inner.by_telegram_id.insert(profile.telegram_id, user.user_id);
                inner.users.insert(user.user_id, user.clone());
                user
            }
        };
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.telegram_username.as_deref() == Some(handle))
            .cloned())
    }

    async fn mutual_contacts(&self, user_id: UserId) -> anyhow::Result<Vec<MutualContact>> {
        Ok(self
            .lock()?
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_contact(
        &self,
        user_id: UserId,
        contact_telegram_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let exists = inner
            .contacts
            .iter()
            .any(|c| c.user_id == user_id && c.contact_telegram_id == contact_telegram_id);
        if !exists {
            inner.contacts.push(MutualContact {
                user_id,
                contact_telegram_id: contact_telegram_id.to_string(),
                created_at: now,
            });
        }
        Ok(())
    }
}
