use chrono::{SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use rollcall_core::domain::action::{ActionId, ActionKind, AttendanceAction};
use rollcall_core::domain::schedule::{ClassId, UserId};
use rollcall_core::store::{ActionLog, StoreError};

use super::parse_timestamp;
use crate::DbPool;

/// Append/consume log behind `/undo`. Entries are written with
/// microsecond-precision timestamps so "most recent first" has enough
/// resolution for rapid attend/undo/attend sequences; the id is a
/// secondary tie-break.
pub struct SqlActionLog {
    pool: DbPool,
}

impl SqlActionLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ActionLog for SqlActionLog {
    async fn append(
        &self,
        user_id: &UserId,
        kind: ActionKind,
        affected_class_ids: &[ClassId],
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(
            &affected_class_ids.iter().map(|class_id| class_id.0.as_str()).collect::<Vec<_>>(),
        )
        .map_err(|error| StoreError::decode(format!("affected_class_ids encode: {error}")))?;

        sqlx::query(
            "INSERT INTO attendance_actions \
                (id, user_id, action_type, affected_class_ids, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id.0)
        .bind(kind.as_str())
        .bind(encoded)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn latest(&self, user_id: &UserId) -> Result<Option<AttendanceAction>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, action_type, affected_class_ids, created_at \
             FROM attendance_actions \
             WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(action_from_row).transpose()
    }

    async fn consume(&self, id: &ActionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM attendance_actions WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(())
    }
}

fn action_from_row(row: SqliteRow) -> Result<AttendanceAction, StoreError> {
    let kind_raw: String = row.try_get("action_type").map_err(StoreError::backend)?;
    let kind = ActionKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::decode(format!("unknown action_type `{kind_raw}`")))?;

    let raw_classes: String = row.try_get("affected_class_ids").map_err(StoreError::backend)?;
    let class_ids: Vec<String> = serde_json::from_str(&raw_classes)
        .map_err(|error| StoreError::decode(format!("affected_class_ids decode: {error}")))?;

    Ok(AttendanceAction {
        id: ActionId(row.try_get("id").map_err(StoreError::backend)?),
        user_id: UserId(row.try_get("user_id").map_err(StoreError::backend)?),
        kind,
        affected_class_ids: class_ids.into_iter().map(ClassId).collect(),
        created_at: parse_timestamp(
            "created_at",
            row.try_get("created_at").map_err(StoreError::backend)?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use rollcall_core::domain::action::ActionKind;
    use rollcall_core::domain::schedule::{ClassId, UserId};
    use rollcall_core::store::ActionLog;

    use super::SqlActionLog;
    use crate::{connect_with_settings, fixtures, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn latest_returns_newest_entry_and_consume_removes_it() {
        let pool = setup_pool().await;
        let log = SqlActionLog::new(pool.clone());
        let user = UserId("u1".to_owned());

        log.append(&user, ActionKind::Attend, &[ClassId("c1".to_owned())])
            .await
            .expect("append first");
        log.append(&user, ActionKind::Absent, &[ClassId("c2".to_owned())])
            .await
            .expect("append second");

        let latest = log.latest(&user).await.expect("latest").expect("entry exists");
        assert_eq!(latest.kind, ActionKind::Absent);
        assert_eq!(latest.affected_class_ids, vec![ClassId("c2".to_owned())]);

        log.consume(&latest.id).await.expect("consume");

        let after = log.latest(&user).await.expect("latest").expect("older entry remains");
        assert_eq!(after.kind, ActionKind::Attend);
        assert_eq!(after.affected_class_ids, vec![ClassId("c1".to_owned())]);

        pool.close().await;
    }

    #[tokio::test]
    async fn latest_is_scoped_per_user() {
        let pool = setup_pool().await;
        let log = SqlActionLog::new(pool.clone());

        log.append(&UserId("u1".to_owned()), ActionKind::Attend, &[ClassId("c1".to_owned())])
            .await
            .expect("append");

        let other = log.latest(&UserId("u2".to_owned())).await.expect("latest");
        assert!(other.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn consume_of_missing_id_is_a_no_op() {
        let pool = setup_pool().await;
        let log = SqlActionLog::new(pool.clone());

        log.consume(&rollcall_core::domain::action::ActionId("missing".to_owned()))
            .await
            .expect("consume missing id");

        pool.close().await;
    }

    #[tokio::test]
    async fn explicit_timestamps_order_entries() {
        let pool = setup_pool().await;
        let log = SqlActionLog::new(pool.clone());
        let user = UserId("u1".to_owned());

        fixtures::insert_action(
            &pool, "older", "u1", "attend", &["c1"], "2026-08-07T05:00:00.000000Z",
        )
        .await
        .expect("seed older");
        fixtures::insert_action(
            &pool, "newer", "u1", "attend", &["c2"], "2026-08-07T05:00:00.000001Z",
        )
        .await
        .expect("seed newer");

        let latest = log.latest(&user).await.expect("latest").expect("entry exists");
        assert_eq!(latest.id.0, "newer", "microsecond resolution must decide ordering");

        pool.close().await;
    }
}
