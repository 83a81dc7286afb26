use chrono::{SecondsFormat, Utc};
use sqlx::Row;

use rollcall_core::domain::schedule::UserId;
use rollcall_core::store::{ChatDirectory, StoreError};

use crate::DbPool;

pub struct SqlChatDirectory {
    pool: DbPool,
}

impl SqlChatDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatDirectory for SqlChatDirectory {
    async fn user_for_chat(&self, chat_id: i64) -> Result<Option<UserId>, StoreError> {
        let row = sqlx::query("SELECT user_id FROM chat_links WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.map(|row| Ok(UserId(row.try_get("user_id").map_err(StoreError::backend)?)))
            .transpose()
    }

    async fn link_chat(&self, chat_id: i64, user_id: &UserId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_links (chat_id, user_id, created_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT (chat_id) DO UPDATE SET user_id = excluded.user_id",
        )
        .bind(chat_id)
        .bind(&user_id.0)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }
}
