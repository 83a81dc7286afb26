use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use rollcall_core::domain::schedule::{
    BatchId, ClassId, ClassRecord, CourseId, Enrollment, UserId,
};
use rollcall_core::store::{ScheduleStore, StoreError};

use super::{parse_date, parse_timestamp, placeholders};
use crate::DbPool;

pub struct SqlScheduleStore {
    pool: DbPool,
}

impl SqlScheduleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CLASS_COLUMNS: &str = "class_id, course_id, course_name, is_lab, class_date, batch_id, \
                             class_start_time, class_end_time, class_venue";

#[async_trait::async_trait]
impl ScheduleStore for SqlScheduleStore {
    async fn enrollment(&self, user_id: &UserId) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query("SELECT batch_id, course_ids FROM enrollments WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.map(|row| {
            let raw_courses: String = row.try_get("course_ids").map_err(StoreError::backend)?;
            let course_ids: Vec<String> = serde_json::from_str(&raw_courses)
                .map_err(|error| StoreError::decode(format!("enrollment course_ids: {error}")))?;

            Ok(Enrollment {
                user_id: user_id.clone(),
                batch_id: BatchId(row.try_get("batch_id").map_err(StoreError::backend)?),
                course_ids: course_ids.into_iter().map(CourseId).collect(),
            })
        })
        .transpose()
    }

    async fn classes_by_date(
        &self,
        batch_id: &BatchId,
        course_ids: &[CourseId],
        date: NaiveDate,
    ) -> Result<Vec<ClassRecord>, StoreError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM timetable_records \
             WHERE class_date = ? AND batch_id = ? AND course_id IN ({}) \
             ORDER BY class_start_time ASC",
            placeholders(course_ids.len()),
        );

        let mut query = sqlx::query(&sql)
            .bind(date.format("%Y-%m-%d").to_string())
            .bind(&batch_id.0);
        for course_id in course_ids {
            query = query.bind(&course_id.0);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(StoreError::backend)?;
        rows.into_iter().map(class_from_row).collect()
    }

    async fn classes_by_ids(&self, class_ids: &[ClassId]) -> Result<Vec<ClassRecord>, StoreError> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM timetable_records \
             WHERE class_id IN ({}) \
             ORDER BY class_start_time ASC",
            placeholders(class_ids.len()),
        );

        let mut query = sqlx::query(&sql);
        for class_id in class_ids {
            query = query.bind(&class_id.0);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(StoreError::backend)?;
        rows.into_iter().map(class_from_row).collect()
    }
}

fn class_from_row(row: SqliteRow) -> Result<ClassRecord, StoreError> {
    Ok(ClassRecord {
        class_id: ClassId(row.try_get("class_id").map_err(StoreError::backend)?),
        course_id: CourseId(row.try_get("course_id").map_err(StoreError::backend)?),
        course_name: row.try_get("course_name").map_err(StoreError::backend)?,
        is_lab: row.try_get::<i64, _>("is_lab").map_err(StoreError::backend)? != 0,
        class_date: parse_date(
            "class_date",
            row.try_get("class_date").map_err(StoreError::backend)?,
        )?,
        batch_id: BatchId(row.try_get("batch_id").map_err(StoreError::backend)?),
        start_time: parse_timestamp(
            "class_start_time",
            row.try_get("class_start_time").map_err(StoreError::backend)?,
        )?,
        end_time: parse_timestamp(
            "class_end_time",
            row.try_get("class_end_time").map_err(StoreError::backend)?,
        )?,
        venue: row.try_get("class_venue").map_err(StoreError::backend)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use rollcall_core::domain::schedule::{BatchId, ClassId, CourseId, UserId};
    use rollcall_core::store::ScheduleStore;

    use super::SqlScheduleStore;
    use crate::{connect_with_settings, fixtures, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn enrollment_round_trips_course_ids() {
        let pool = setup_pool().await;
        fixtures::insert_enrollment(&pool, "u1", "batch-1", &["course-a", "course-b"])
            .await
            .expect("seed enrollment");

        let store = SqlScheduleStore::new(pool.clone());
        let enrollment = store
            .enrollment(&UserId("u1".to_owned()))
            .await
            .expect("read")
            .expect("enrollment exists");

        assert_eq!(enrollment.batch_id, BatchId("batch-1".to_owned()));
        assert_eq!(
            enrollment.course_ids,
            vec![CourseId("course-a".to_owned()), CourseId("course-b".to_owned())]
        );

        let missing = store.enrollment(&UserId("u2".to_owned())).await.expect("read");
        assert!(missing.is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn classes_by_date_filters_and_orders_by_start_time() {
        let pool = setup_pool().await;
        fixtures::insert_timetable_class(
            &pool, "late", "course-a", "Course A", false, "2026-08-07", "batch-1",
            "2026-08-07T08:30:00Z", "2026-08-07T09:30:00Z", Some("Hall 2"),
        )
        .await
        .expect("seed class");
        fixtures::insert_timetable_class(
            &pool, "early", "course-a", "Course A", false, "2026-08-07", "batch-1",
            "2026-08-07T03:30:00Z", "2026-08-07T04:30:00Z", None,
        )
        .await
        .expect("seed class");
        // different batch and different date must not appear
        fixtures::insert_timetable_class(
            &pool, "other-batch", "course-a", "Course A", false, "2026-08-07", "batch-2",
            "2026-08-07T05:30:00Z", "2026-08-07T06:30:00Z", None,
        )
        .await
        .expect("seed class");
        fixtures::insert_timetable_class(
            &pool, "other-day", "course-a", "Course A", false, "2026-08-08", "batch-1",
            "2026-08-08T03:30:00Z", "2026-08-08T04:30:00Z", None,
        )
        .await
        .expect("seed class");

        let store = SqlScheduleStore::new(pool.clone());
        let classes = store
            .classes_by_date(
                &BatchId("batch-1".to_owned()),
                &[CourseId("course-a".to_owned())],
                NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date"),
            )
            .await
            .expect("read classes");

        let ids: Vec<&str> = classes.iter().map(|class| class.class_id.0.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(classes[1].venue.as_deref(), Some("Hall 2"));

        pool.close().await;
    }

    #[tokio::test]
    async fn classes_by_ids_returns_only_surviving_entries() {
        let pool = setup_pool().await;
        fixtures::insert_timetable_class(
            &pool, "c1", "course-a", "Course A", true, "2026-08-07", "batch-1",
            "2026-08-07T03:30:00Z", "2026-08-07T04:30:00Z", None,
        )
        .await
        .expect("seed class");

        let store = SqlScheduleStore::new(pool.clone());
        let classes = store
            .classes_by_ids(&[ClassId("c1".to_owned()), ClassId("removed".to_owned())])
            .await
            .expect("read classes");

        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].class_id.0, "c1");
        assert!(classes[0].is_lab);

        let none = store.classes_by_ids(&[]).await.expect("read empty");
        assert!(none.is_empty());

        pool.close().await;
    }
}
