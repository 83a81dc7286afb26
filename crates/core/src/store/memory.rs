use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::action::{ActionId, ActionKind, AttendanceAction};
use crate::domain::attendance::{
    AttendanceEntry, DeleteResult, EffectiveCourseAttendance, MarkResult, MarkStatus, StatusResult,
};
use crate::domain::schedule::{BatchId, ClassId, ClassRecord, CourseId, Enrollment, UserId};

use super::{ActionLog, AttendanceStore, ChatDirectory, ScheduleStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone, Debug)]
struct DeltaRow {
    user_id: UserId,
    class_id: ClassId,
    course_id: CourseId,
}

/// In-memory attendance store for engine tests and the no-database demo
/// path. `fail_class_ids` lets tests inject per-class persistence failures.
#[derive(Default)]
pub struct InMemoryAttendanceStore {
    rows: Mutex<Vec<DeltaRow>>,
    snapshots: Mutex<Vec<EffectiveCourseAttendance>>,
    fail_class_ids: Mutex<HashSet<String>>,
}

impl InMemoryAttendanceStore {
    pub fn fail_for(&self, class_id: &ClassId) {
        lock(&self.fail_class_ids).insert(class_id.0.clone());
    }

    pub fn set_course_snapshot(&self, snapshot: EffectiveCourseAttendance) {
        lock(&self.snapshots).push(snapshot);
    }

    /// Class ids currently marked for `user_id`, in insertion order.
    pub fn marked_classes(&self, user_id: &UserId) -> Vec<ClassId> {
        lock(&self.rows)
            .iter()
            .filter(|row| &row.user_id == user_id)
            .map(|row| row.class_id.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn mark_attendance_bulk(
        &self,
        user_id: &UserId,
        entries: &[AttendanceEntry],
        _checkin_time: DateTime<Utc>,
    ) -> Result<Vec<MarkResult>, StoreError> {
        let failing = lock(&self.fail_class_ids).clone();
        let mut rows = lock(&self.rows);

        Ok(entries
            .iter()
            .map(|entry| {
                let status = if failing.contains(&entry.class_id.0) {
                    MarkStatus::Failed
                } else if rows
                    .iter()
                    .any(|row| &row.user_id == user_id && row.class_id == entry.class_id)
                {
                    MarkStatus::Already
                } else {
                    rows.push(DeltaRow {
                        user_id: user_id.clone(),
                        class_id: entry.class_id.clone(),
                        course_id: entry.course_id.clone(),
                    });
                    MarkStatus::Marked
                };

                MarkResult { class_id: entry.class_id.clone(), status }
            })
            .collect())
    }

    async fn delete_attendance_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<DeleteResult>, StoreError> {
        let mut rows = lock(&self.rows);

        Ok(class_ids
            .iter()
            .map(|class_id| {
                let before = rows.len();
                rows.retain(|row| !(&row.user_id == user_id && &row.class_id == class_id));
                DeleteResult { class_id: class_id.clone(), deleted: rows.len() < before }
            })
            .collect())
    }

    async fn attendance_status_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<StatusResult>, StoreError> {
        let rows = lock(&self.rows);

        Ok(class_ids
            .iter()
            .map(|class_id| StatusResult {
                class_id: class_id.clone(),
                is_marked: rows
                    .iter()
                    .any(|row| &row.user_id == user_id && &row.class_id == class_id),
            })
            .collect())
    }

    async fn effective_course_attendance(
        &self,
        user_id: &UserId,
        _today: NaiveDate,
    ) -> Result<Vec<EffectiveCourseAttendance>, StoreError> {
        let rows = lock(&self.rows);

        Ok(lock(&self.snapshots)
            .iter()
            .map(|snapshot| {
                let deltas = rows
                    .iter()
                    .filter(|row| &row.user_id == user_id && row.course_id == snapshot.course_id)
                    .count() as u32;
                EffectiveCourseAttendance {
                    effective_attended_classes: snapshot.effective_attended_classes + deltas,
                    ..snapshot.clone()
                }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    enrollments: Mutex<HashMap<String, Enrollment>>,
    classes: Mutex<Vec<ClassRecord>>,
}

impl InMemoryScheduleStore {
    pub fn insert_enrollment(&self, enrollment: Enrollment) {
        lock(&self.enrollments).insert(enrollment.user_id.0.clone(), enrollment);
    }

    pub fn insert_class(&self, class: ClassRecord) {
        lock(&self.classes).push(class);
    }

    pub fn remove_class(&self, class_id: &ClassId) {
        lock(&self.classes).retain(|class| &class.class_id != class_id);
    }
}

#[async_trait::async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn enrollment(&self, user_id: &UserId) -> Result<Option<Enrollment>, StoreError> {
        Ok(lock(&self.enrollments).get(&user_id.0).cloned())
    }

    async fn classes_by_date(
        &self,
        batch_id: &BatchId,
        course_ids: &[CourseId],
        date: NaiveDate,
    ) -> Result<Vec<ClassRecord>, StoreError> {
        let mut matching: Vec<ClassRecord> = lock(&self.classes)
            .iter()
            .filter(|class| {
                &class.batch_id == batch_id
                    && class.class_date == date
                    && course_ids.contains(&class.course_id)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|class| class.start_time);
        Ok(matching)
    }

    async fn classes_by_ids(&self, class_ids: &[ClassId]) -> Result<Vec<ClassRecord>, StoreError> {
        Ok(lock(&self.classes)
            .iter()
            .filter(|class| class_ids.contains(&class.class_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryActionLog {
    entries: Mutex<Vec<AttendanceAction>>,
}

impl InMemoryActionLog {
    /// Appends an entry with an explicit timestamp; tests use this to stage
    /// actions from previous days.
    pub fn append_at(
        &self,
        user_id: &UserId,
        kind: ActionKind,
        affected_class_ids: &[ClassId],
        created_at: DateTime<Utc>,
    ) {
        lock(&self.entries).push(AttendanceAction {
            id: ActionId(Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            kind,
            affected_class_ids: affected_class_ids.to_vec(),
            created_at,
        });
    }

    pub fn entries_for(&self, user_id: &UserId) -> Vec<AttendanceAction> {
        lock(&self.entries).iter().filter(|entry| &entry.user_id == user_id).cloned().collect()
    }
}

#[async_trait::async_trait]
impl ActionLog for InMemoryActionLog {
    async fn append(
        &self,
        user_id: &UserId,
        kind: ActionKind,
        affected_class_ids: &[ClassId],
    ) -> Result<(), StoreError> {
        self.append_at(user_id, kind, affected_class_ids, Utc::now());
        Ok(())
    }

    async fn latest(&self, user_id: &UserId) -> Result<Option<AttendanceAction>, StoreError> {
        Ok(lock(&self.entries)
            .iter()
            .filter(|entry| &entry.user_id == user_id)
            .max_by(|left, right| {
                left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
            })
            .cloned())
    }

    async fn consume(&self, id: &ActionId) -> Result<(), StoreError> {
        lock(&self.entries).retain(|entry| &entry.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChatDirectory {
    links: Mutex<HashMap<i64, UserId>>,
}

#[async_trait::async_trait]
impl ChatDirectory for InMemoryChatDirectory {
    async fn user_for_chat(&self, chat_id: i64) -> Result<Option<UserId>, StoreError> {
        Ok(lock(&self.links).get(&chat_id).cloned())
    }

    async fn link_chat(&self, chat_id: i64, user_id: &UserId) -> Result<(), StoreError> {
        lock(&self.links).insert(chat_id, user_id.clone());
        Ok(())
    }
}
