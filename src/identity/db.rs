//! PostgreSQL user directory

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::directory::UserDirectory;
use super::{MutualContact, TelegramProfile, User, UserId};

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        telegram_id: row.try_get("telegram_id")?,
        telegram_username: row.try_get("telegram_username")?,
        full_name: row.try_get("full_name")?,
        profile_pic_url: row.try_get("profile_pic_url")?,
        created_at: row.try_get("created_at")?,
        last_active_at: row.try_get("last_active_at")?,
    })
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn upsert_user(&self, profile: TelegramProfile, now: DateTime<Utc>) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await.context("begin upsert_user")?;

        if let Some(handle) = &profile.telegram_username {
            sqlx::query(
                "UPDATE users SET telegram_username = NULL \
                 WHERE telegram_username = $1 AND telegram_id <> $2",
            )
            .bind(handle)
            .bind(&profile.telegram_id)
            .execute(&mut *tx)
            .await
            .context("release stale handle")?;
        }

        let row = sqlx::query(
            r#"
            INSERT INTO users (user_id, telegram_id, telegram_username, profile_pic_url, full_name, created_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (telegram_id) DO UPDATE SET
                telegram_username = EXCLUDED.telegram_username,
                profile_pic_url = EXCLUDED.profile_pic_url,
                full_name = EXCLUDED.full_name,
                last_active_at = EXCLUDED.last_active_at
            RETURNING user_id, telegram_id, telegram_username, full_name, profile_pic_url, created_at, last_active_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&profile.telegram_id)
        .bind(&profile.telegram_username)
        .bind(&profile.profile_pic_url)
        .bind(&profile.full_name)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .context("upsert user")?;

        tx.commit().await.context("commit upsert_user")?;
        Ok(row_to_user(&row)?)
    }

    async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, telegram_id, telegram_username, full_name, profile_pic_url, \
             created_at, last_active_at FROM users WHERE user_id = $1",
        )
        .bind(user_id.inner())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_user).transpose()?)
    }

    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, telegram_id, telegram_username, full_name, profile_pic_url, \
             created_at, last_active_at FROM users WHERE telegram_username = $1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_user).transpose()?)
    }

    async fn mutual_contacts(&self, user_id: UserId) -> anyhow::Result<Vec<MutualContact>> {
        let rows = sqlx::query(
            "SELECT user_id, contact_telegram_id, created_at FROM mutual_contacts \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id.inner())
        .fetch_all(&self.pool)
        .await?;

        let mut contacts = Vec::with_capacity(rows.len());
        for row in rows {
            contacts.push(MutualContact {
                user_id: UserId::from_uuid(row.try_get("user_id")?),
                contact_telegram_id: row.try_get("contact_telegram_id")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(contacts)
    }

    async fn add_contact(
        &self,
        user_id: UserId,
        contact_telegram_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO mutual_contacts (user_id, contact_telegram_id, created_at) \
             VALUES ($1, $2, $3) ON CONFLICT (user_id, contact_telegram_id) DO NOTHING",
        )
        .bind(user_id.inner())
        .bind(contact_telegram_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
