//! Seed helpers shared by the integration suites. Timestamps are passed as
//! RFC 3339 strings so tests can stage rows from specific instants,
//! including previous days.

use sqlx::Row;

use rollcall_core::domain::schedule::{ClassId, UserId};
use rollcall_core::store::StoreError;

use crate::DbPool;

/// Marked class ids for a user in class-id order, for assertions.
pub async fn marked_class_ids(pool: &DbPool, user_id: &UserId) -> Result<Vec<ClassId>, StoreError> {
    let rows = sqlx::query(
        "SELECT class_id FROM attendance_records WHERE user_id = ? ORDER BY class_id ASC",
    )
    .bind(&user_id.0)
    .fetch_all(pool)
    .await
    .map_err(StoreError::backend)?;

    rows.into_iter()
        .map(|row| Ok(ClassId(row.try_get("class_id").map_err(StoreError::backend)?)))
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_timetable_class(
    pool: &DbPool,
    class_id: &str,
    course_id: &str,
    course_name: &str,
    is_lab: bool,
    class_date: &str,
    batch_id: &str,
    start_time: &str,
    end_time: &str,
    venue: Option<&str>,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO timetable_records \
            (class_id, course_id, course_name, is_lab, class_date, batch_id, \
             class_start_time, class_end_time, class_venue, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(class_id)
    .bind(course_id)
    .bind(course_name)
    .bind(i64::from(is_lab))
    .bind(class_date)
    .bind(batch_id)
    .bind(start_time)
    .bind(end_time)
    .bind(venue)
    .bind(start_time)
    .execute(pool)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}

pub async fn insert_enrollment(
    pool: &DbPool,
    user_id: &str,
    batch_id: &str,
    course_ids: &[&str],
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(course_ids)
        .map_err(|error| StoreError::decode(format!("course_ids encode: {error}")))?;

    sqlx::query(
        "INSERT INTO enrollments (user_id, batch_id, course_ids, created_at) \
         VALUES (?, ?, ?, '2026-01-01T00:00:00Z')",
    )
    .bind(user_id)
    .bind(batch_id)
    .bind(encoded)
    .execute(pool)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_snapshot(
    pool: &DbPool,
    user_id: &str,
    course_id: &str,
    course_name: &str,
    is_lab: bool,
    attended_classes: u32,
    total_classes: u32,
    snapshot_at: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO course_stat_snapshots \
            (user_id, course_id, course_name, is_lab, attended_classes, total_classes, \
             snapshot_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(course_name)
    .bind(i64::from(is_lab))
    .bind(i64::from(attended_classes))
    .bind(i64::from(total_classes))
    .bind(snapshot_at)
    .execute(pool)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}

/// Inserts an audit entry with an explicit id and timestamp.
pub async fn insert_action(
    pool: &DbPool,
    id: &str,
    user_id: &str,
    action_type: &str,
    affected_class_ids: &[&str],
    created_at: &str,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(affected_class_ids)
        .map_err(|error| StoreError::decode(format!("affected_class_ids encode: {error}")))?;

    sqlx::query(
        "INSERT INTO attendance_actions \
            (id, user_id, action_type, affected_class_ids, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(action_type)
    .bind(encoded)
    .bind(created_at)
    .execute(pool)
    .await
    .map_err(StoreError::backend)?;

    Ok(())
}
