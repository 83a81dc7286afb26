use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use rollcall_core::domain::attendance::{
    AttendanceEntry, DeleteResult, EffectiveCourseAttendance, MarkResult, MarkStatus, StatusResult,
};
use rollcall_core::domain::schedule::{ClassId, CourseId, UserId};
use rollcall_core::store::{AttendanceStore, StoreError};

use super::parse_count;
use crate::DbPool;

/// SQLite realization of the attendance store contract. Each bulk call is a
/// single repository invocation; inside it every class is its own
/// conflict-aware statement, so one class failing cannot abort the rest and
/// a duplicate delivery lands on the unique `(user_id, class_id)` pair as a
/// no-op instead of a second row.
pub struct SqlAttendanceStore {
    pool: DbPool,
}

impl SqlAttendanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AttendanceStore for SqlAttendanceStore {
    async fn mark_attendance_bulk(
        &self,
        user_id: &UserId,
        entries: &[AttendanceEntry],
        checkin_time: DateTime<Utc>,
    ) -> Result<Vec<MarkResult>, StoreError> {
        let mut results = Vec::with_capacity(entries.len());
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        for entry in entries {
            let outcome = sqlx::query(
                "INSERT INTO attendance_records \
                    (user_id, class_id, course_id, class_time, checkin_time, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (user_id, class_id) DO NOTHING",
            )
            .bind(&user_id.0)
            .bind(&entry.class_id.0)
            .bind(&entry.course_id.0)
            .bind(entry.class_time.to_rfc3339())
            .bind(checkin_time.to_rfc3339())
            .bind(&created_at)
            .execute(&self.pool)
            .await;

            let status = match outcome {
                Ok(done) if done.rows_affected() == 1 => MarkStatus::Marked,
                Ok(_) => MarkStatus::Already,
                Err(error) => {
                    tracing::warn!(
                        event_name = "attendance_store.mark_failed",
                        user_id = %user_id.0,
                        class_id = %entry.class_id.0,
                        error = %error,
                        "mark insert failed for one class; continuing with the rest"
                    );
                    MarkStatus::Failed
                }
            };

            results.push(MarkResult { class_id: entry.class_id.clone(), status });
        }

        Ok(results)
    }

    async fn delete_attendance_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<DeleteResult>, StoreError> {
        let mut results = Vec::with_capacity(class_ids.len());

        for class_id in class_ids {
            let done =
                sqlx::query("DELETE FROM attendance_records WHERE user_id = ? AND class_id = ?")
                    .bind(&user_id.0)
                    .bind(&class_id.0)
                    .execute(&self.pool)
                    .await
                    .map_err(StoreError::backend)?;

            results
                .push(DeleteResult { class_id: class_id.clone(), deleted: done.rows_affected() > 0 });
        }

        Ok(results)
    }

    async fn attendance_status_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<StatusResult>, StoreError> {
        let mut results = Vec::with_capacity(class_ids.len());

        for class_id in class_ids {
            let is_marked = sqlx::query_scalar::<_, i64>(
                "SELECT EXISTS( \
                    SELECT 1 FROM attendance_records WHERE user_id = ? AND class_id = ?)",
            )
            .bind(&user_id.0)
            .bind(&class_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

            results.push(StatusResult { class_id: class_id.clone(), is_marked: is_marked == 1 });
        }

        Ok(results)
    }

    async fn effective_course_attendance(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<Vec<EffectiveCourseAttendance>, StoreError> {
        let rows = sqlx::query(
            "SELECT \
                s.course_id, \
                s.course_name, \
                s.is_lab, \
                s.attended_classes + ( \
                    SELECT COUNT(*) FROM attendance_records a \
                    WHERE a.user_id = s.user_id \
                      AND a.course_id = s.course_id \
                      AND a.created_at > s.snapshot_at \
                ) AS effective_attended_classes, \
                s.total_classes + ( \
                    SELECT COUNT(*) FROM timetable_records t \
                    JOIN enrollments e ON e.user_id = s.user_id \
                    WHERE t.course_id = s.course_id \
                      AND t.batch_id = e.batch_id \
                      AND t.class_date > date(s.snapshot_at) \
                      AND t.class_date <= ? \
                ) AS effective_total_classes \
             FROM course_stat_snapshots s \
             WHERE s.user_id = ? \
             ORDER BY s.course_name ASC",
        )
        .bind(today.format("%Y-%m-%d").to_string())
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(course_attendance_from_row).collect()
    }
}

fn course_attendance_from_row(row: SqliteRow) -> Result<EffectiveCourseAttendance, StoreError> {
    Ok(EffectiveCourseAttendance {
        course_id: CourseId(row.try_get("course_id").map_err(StoreError::backend)?),
        course_name: row.try_get("course_name").map_err(StoreError::backend)?,
        is_lab: row.try_get::<i64, _>("is_lab").map_err(StoreError::backend)? != 0,
        effective_attended_classes: parse_count(
            "effective_attended_classes",
            row.try_get("effective_attended_classes").map_err(StoreError::backend)?,
        )?,
        effective_total_classes: parse_count(
            "effective_total_classes",
            row.try_get("effective_total_classes").map_err(StoreError::backend)?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use rollcall_core::domain::attendance::{AttendanceEntry, MarkStatus};
    use rollcall_core::domain::schedule::{ClassId, CourseId, UserId};
    use rollcall_core::store::AttendanceStore;

    use super::SqlAttendanceStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn entry(class: &str) -> AttendanceEntry {
        AttendanceEntry {
            class_id: ClassId(class.to_owned()),
            course_id: CourseId(format!("course-{class}")),
            class_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn marking_twice_yields_marked_then_already_with_one_row() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());
        let entries = vec![entry("c1"), entry("c2")];

        let first = store.mark_attendance_bulk(&user, &entries, Utc::now()).await.expect("first");
        assert!(first.iter().all(|result| result.status == MarkStatus::Marked));

        let second =
            store.mark_attendance_bulk(&user, &entries, Utc::now()).await.expect("second");
        assert!(second.iter().all(|result| result.status == MarkStatus::Already));

        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendance_records WHERE user_id = 'u1'",
        )
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(rows, 2, "duplicate marks must not create duplicate deltas");

        pool.close().await;
    }

    #[tokio::test]
    async fn results_preserve_caller_order() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());
        let entries = vec![entry("zz"), entry("aa"), entry("mm")];

        let results = store.mark_attendance_bulk(&user, &entries, Utc::now()).await.expect("mark");
        let order: Vec<&str> = results.iter().map(|result| result.class_id.0.as_str()).collect();
        assert_eq!(order, vec!["zz", "aa", "mm"]);

        let deletions = store
            .delete_attendance_bulk(
                &user,
                &[ClassId("mm".to_owned()), ClassId("zz".to_owned()), ClassId("aa".to_owned())],
            )
            .await
            .expect("delete");
        let delete_order: Vec<&str> =
            deletions.iter().map(|result| result.class_id.0.as_str()).collect();
        assert_eq!(delete_order, vec!["mm", "zz", "aa"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn deleting_twice_yields_true_then_false() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());

        store
            .mark_attendance_bulk(&user, &[entry("c1")], Utc::now())
            .await
            .expect("seed mark");

        let class_ids = [ClassId("c1".to_owned())];
        let first = store.delete_attendance_bulk(&user, &class_ids).await.expect("first delete");
        assert!(first[0].deleted);

        let second = store.delete_attendance_bulk(&user, &class_ids).await.expect("second delete");
        assert!(!second[0].deleted);

        pool.close().await;
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());

        assert!(store
            .mark_attendance_bulk(&user, &[], Utc::now())
            .await
            .expect("mark")
            .is_empty());
        assert!(store.delete_attendance_bulk(&user, &[]).await.expect("delete").is_empty());

        let rows =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance_records")
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(rows, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn status_bulk_reflects_current_deltas() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());

        store
            .mark_attendance_bulk(&user, &[entry("c1")], Utc::now())
            .await
            .expect("seed mark");

        let statuses = store
            .attendance_status_bulk(
                &user,
                &[ClassId("c1".to_owned()), ClassId("c2".to_owned())],
            )
            .await
            .expect("status");

        assert!(statuses[0].is_marked);
        assert!(!statuses[1].is_marked);

        pool.close().await;
    }

    #[tokio::test]
    async fn effective_attendance_merges_snapshot_with_deltas() {
        let pool = setup_pool().await;
        let store = SqlAttendanceStore::new(pool.clone());
        let user = UserId("u1".to_owned());
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date");

        crate::fixtures::insert_snapshot(&pool, "u1", "course-c1", "Signals", false, 10, 20,
            "2020-01-01T00:00:00Z")
            .await
            .expect("seed snapshot");
        crate::fixtures::insert_enrollment(&pool, "u1", "batch-1", &["course-c1"])
            .await
            .expect("seed enrollment");
        // two post-snapshot classes on the timetable, one attended
        crate::fixtures::insert_timetable_class(
            &pool, "c1", "course-c1", "Signals", false, "2026-08-05", "batch-1",
            "2026-08-05T03:30:00Z", "2026-08-05T04:30:00Z", None,
        )
        .await
        .expect("seed class");
        crate::fixtures::insert_timetable_class(
            &pool, "c2", "course-c1", "Signals", false, "2026-08-07", "batch-1",
            "2026-08-07T03:30:00Z", "2026-08-07T04:30:00Z", None,
        )
        .await
        .expect("seed class");
        store
            .mark_attendance_bulk(&user, &[entry("c1")], Utc::now())
            .await
            .expect("mark delta");

        let courses =
            store.effective_course_attendance(&user, today).await.expect("effective read");

        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].effective_attended_classes, 11);
        assert_eq!(courses[0].effective_total_classes, 22);

        pool.close().await;
    }
}
