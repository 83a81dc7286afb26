use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::OperatingTz;
use crate::domain::action::ActionKind;
use crate::domain::attendance::AttendanceEntry;
use crate::domain::schedule::UserId;
use crate::store::{ActionLog, AttendanceStore, ScheduleStore, StoreError};

/// Outcome of an undo attempt. Logical refusals are distinct variants so
/// callers can phrase them precisely; store failures surface as errors and
/// always leave the log entry intact for a retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoOutcome {
    /// No audit entry exists for the user.
    NothingToUndo,
    /// The most recent entry was created on a previous calendar day in the
    /// operating timezone. The entry is left untouched.
    StaleAction { action_date: NaiveDate },
    /// An absence undo found none of the logged classes still on the
    /// schedule; nothing is safe to restore and the entry is kept.
    NothingRestorable,
    /// The reversal succeeded. `class_count` is the number of classes the
    /// reversal actually touched, which for an absence undo may be fewer
    /// than were originally logged.
    Reverted { kind: ActionKind, class_count: usize },
}

/// Single-step, same-day undo over the append/consume action log.
///
/// - `attend` undo deletes the logged deltas unconditionally: those rows are
///   known to have been created by the action being undone, and deleting
///   already-deleted rows is a no-op, so retries are safe.
/// - `absent` undo restores conservatively: only classes that still resolve
///   on the schedule are re-inserted, through the conflict-aware bulk-mark
///   primitive, so a retry after a partial restore re-inserts nothing
///   twice.
pub struct UndoEngine {
    actions: Arc<dyn ActionLog>,
    attendance: Arc<dyn AttendanceStore>,
    schedule: Arc<dyn ScheduleStore>,
    tz: OperatingTz,
}

impl UndoEngine {
    pub fn new(
        actions: Arc<dyn ActionLog>,
        attendance: Arc<dyn AttendanceStore>,
        schedule: Arc<dyn ScheduleStore>,
        tz: OperatingTz,
    ) -> Self {
        Self { actions, attendance, schedule, tz }
    }

    pub async fn undo_last_action(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UndoOutcome, StoreError> {
        let Some(action) = self.actions.latest(user_id).await? else {
            return Ok(UndoOutcome::NothingToUndo);
        };

        let action_date = self.tz.local_date(action.created_at);
        if action_date != self.tz.today(now) {
            return Ok(UndoOutcome::StaleAction { action_date });
        }

        match action.kind {
            ActionKind::Attend => {
                self.attendance
                    .delete_attendance_bulk(user_id, &action.affected_class_ids)
                    .await?;
                self.actions.consume(&action.id).await?;
                Ok(UndoOutcome::Reverted {
                    kind: ActionKind::Attend,
                    class_count: action.affected_class_ids.len(),
                })
            }
            ActionKind::Absent => {
                let classes = self.schedule.classes_by_ids(&action.affected_class_ids).await?;
                if classes.is_empty() {
                    return Ok(UndoOutcome::NothingRestorable);
                }

                let entries: Vec<AttendanceEntry> = classes
                    .iter()
                    .map(|class| AttendanceEntry {
                        class_id: class.class_id.clone(),
                        course_id: class.course_id.clone(),
                        class_time: class.start_time,
                    })
                    .collect();

                self.attendance.mark_attendance_bulk(user_id, &entries, now).await?;
                self.actions.consume(&action.id).await?;
                Ok(UndoOutcome::Reverted {
                    kind: ActionKind::Absent,
                    class_count: classes.len(),
                })
            }
        }
    }
}
