use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::action::{ActionId, ActionKind, AttendanceAction};
use crate::domain::attendance::{
    AttendanceEntry, DeleteResult, EffectiveCourseAttendance, MarkResult, StatusResult,
};
use crate::domain::schedule::{BatchId, ClassId, ClassRecord, CourseId, Enrollment, UserId};

pub mod memory;

pub use memory::{
    InMemoryActionLog, InMemoryAttendanceStore, InMemoryChatDirectory, InMemoryScheduleStore,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn backend(source: impl std::fmt::Display) -> Self {
        Self::Backend(source.to_string())
    }

    pub fn decode(source: impl std::fmt::Display) -> Self {
        Self::Decode(source.to_string())
    }
}

/// The attendance store's bulk mutation and read contract.
///
/// Guarantees required of every implementation:
/// - results come back in caller-supplied class order;
/// - `mark_attendance_bulk` is idempotent per `(user, class)`: a duplicate
///   call reports `Already` without creating a second delta row, even under
///   concurrent duplicate invocations (conflict-aware insert, not
///   read-then-insert);
/// - one class failing to persist never aborts the remaining classes;
/// - an empty input list is a no-op returning an empty result list.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn mark_attendance_bulk(
        &self,
        user_id: &UserId,
        entries: &[AttendanceEntry],
        checkin_time: DateTime<Utc>,
    ) -> Result<Vec<MarkResult>, StoreError>;

    async fn delete_attendance_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<DeleteResult>, StoreError>;

    async fn attendance_status_bulk(
        &self,
        user_id: &UserId,
        class_ids: &[ClassId],
    ) -> Result<Vec<StatusResult>, StoreError>;

    /// Snapshot-plus-deltas attendance per course; opaque beyond its output
    /// shape. `today` bounds which scheduled classes count toward totals.
    async fn effective_course_attendance(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<Vec<EffectiveCourseAttendance>, StoreError>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn enrollment(&self, user_id: &UserId) -> Result<Option<Enrollment>, StoreError>;

    /// A batch's classes for the given courses on a date, ordered by start
    /// time.
    async fn classes_by_date(
        &self,
        batch_id: &BatchId,
        course_ids: &[CourseId],
        date: NaiveDate,
    ) -> Result<Vec<ClassRecord>, StoreError>;

    /// The subset of `class_ids` that still resolve to schedule entries.
    async fn classes_by_ids(&self, class_ids: &[ClassId]) -> Result<Vec<ClassRecord>, StoreError>;
}

/// Append/consume log of reversible attendance actions. Appends are
/// best-effort from the caller's point of view: a failed append must never
/// fail the mutation that triggered it.
#[async_trait]
pub trait ActionLog: Send + Sync {
    async fn append(
        &self,
        user_id: &UserId,
        kind: ActionKind,
        affected_class_ids: &[ClassId],
    ) -> Result<(), StoreError>;

    /// Most recent entry for the user by creation time, newest first.
    async fn latest(&self, user_id: &UserId) -> Result<Option<AttendanceAction>, StoreError>;

    /// Deletes a consumed entry. Consuming an already-consumed id is a
    /// no-op, which keeps undo retries safe.
    async fn consume(&self, id: &ActionId) -> Result<(), StoreError>;
}

/// Chat-to-user identity mapping established by account linking.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn user_for_chat(&self, chat_id: i64) -> Result<Option<UserId>, StoreError>;

    async fn link_chat(&self, chat_id: i64, user_id: &UserId) -> Result<(), StoreError>;
}
