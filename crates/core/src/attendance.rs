use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::action::ActionKind;
use crate::domain::attendance::{
    AttendanceEntry, ClassAbsenceOutcome, ClassMarkOutcome, MarkStatus,
};
use crate::domain::schedule::{resolve_indices, ClassId, ClassRecord, UserId};
use crate::store::{ActionLog, AttendanceStore, StoreError};

/// Bulk attendance mutator: maps validated schedule indices onto store
/// entries, issues one idempotent bulk call, and zips per-class outcomes
/// back in caller order. Every successful mutation is recorded in the
/// action log best-effort: an audit write failure never fails the
/// mutation, it only makes `/undo` unable to revert it.
pub struct AttendanceService {
    attendance: Arc<dyn AttendanceStore>,
    actions: Arc<dyn ActionLog>,
}

impl AttendanceService {
    pub fn new(attendance: Arc<dyn AttendanceStore>, actions: Arc<dyn ActionLog>) -> Self {
        Self { attendance, actions }
    }

    /// Marks the classes at the given 1-based indices present. Indices must
    /// already be validated against `classes.len()`.
    pub async fn mark_by_indices(
        &self,
        user_id: &UserId,
        classes: &[ClassRecord],
        indices: &[usize],
        checkin_time: DateTime<Utc>,
    ) -> Result<Vec<ClassMarkOutcome>, StoreError> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let selections = resolve_indices(classes, indices);
        let entries: Vec<AttendanceEntry> = selections
            .iter()
            .map(|(_, class)| AttendanceEntry {
                class_id: class.class_id.clone(),
                course_id: class.course_id.clone(),
                class_time: class.start_time,
            })
            .collect();

        let results =
            self.attendance.mark_attendance_bulk(user_id, &entries, checkin_time).await?;
        let status_by_class: HashMap<&str, MarkStatus> =
            results.iter().map(|result| (result.class_id.0.as_str(), result.status)).collect();

        let outcomes: Vec<ClassMarkOutcome> = selections
            .into_iter()
            .map(|(index, class)| ClassMarkOutcome {
                index,
                class_id: class.class_id.clone(),
                course_name: class.course_name.clone(),
                status: status_by_class
                    .get(class.class_id.0.as_str())
                    .copied()
                    .unwrap_or(MarkStatus::Failed),
            })
            .collect();

        let marked: Vec<ClassId> = outcomes
            .iter()
            .filter(|outcome| outcome.status == MarkStatus::Marked)
            .map(|outcome| outcome.class_id.clone())
            .collect();
        self.record_action(user_id, ActionKind::Attend, &marked).await;

        Ok(outcomes)
    }

    pub async fn mark_all(
        &self,
        user_id: &UserId,
        classes: &[ClassRecord],
        checkin_time: DateTime<Utc>,
    ) -> Result<Vec<ClassMarkOutcome>, StoreError> {
        let indices: Vec<usize> = (1..=classes.len()).collect();
        self.mark_by_indices(user_id, classes, &indices, checkin_time).await
    }

    pub async fn mark_class(
        &self,
        user_id: &UserId,
        class: &ClassRecord,
        checkin_time: DateTime<Utc>,
    ) -> Result<MarkStatus, StoreError> {
        let outcomes = self
            .mark_by_indices(user_id, std::slice::from_ref(class), &[1], checkin_time)
            .await?;
        Ok(outcomes.first().map(|outcome| outcome.status).unwrap_or(MarkStatus::Failed))
    }

    /// Marks the classes at the given 1-based indices absent by deleting
    /// their present-deltas. Deletion is itself the "absent" state; there is
    /// no separate absent row.
    pub async fn absence_by_indices(
        &self,
        user_id: &UserId,
        classes: &[ClassRecord],
        indices: &[usize],
    ) -> Result<Vec<ClassAbsenceOutcome>, StoreError> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let selections = resolve_indices(classes, indices);
        let class_ids: Vec<ClassId> =
            selections.iter().map(|(_, class)| class.class_id.clone()).collect();

        let results = self.attendance.delete_attendance_bulk(user_id, &class_ids).await?;
        let deleted_by_class: HashMap<&str, bool> =
            results.iter().map(|result| (result.class_id.0.as_str(), result.deleted)).collect();

        let outcomes: Vec<ClassAbsenceOutcome> = selections
            .into_iter()
            .map(|(index, class)| ClassAbsenceOutcome {
                index,
                class_id: class.class_id.clone(),
                course_name: class.course_name.clone(),
                deleted: deleted_by_class.get(class.class_id.0.as_str()).copied().unwrap_or(false),
            })
            .collect();

        // Absence logs every attempted deletion, whether or not a delta
        // existed: the user's intent was "absent for these classes".
        self.record_action(user_id, ActionKind::Absent, &class_ids).await;

        Ok(outcomes)
    }

    pub async fn absence_all(
        &self,
        user_id: &UserId,
        classes: &[ClassRecord],
    ) -> Result<Vec<ClassAbsenceOutcome>, StoreError> {
        let indices: Vec<usize> = (1..=classes.len()).collect();
        self.absence_by_indices(user_id, classes, &indices).await
    }

    pub async fn absence_class(
        &self,
        user_id: &UserId,
        class: &ClassRecord,
    ) -> Result<bool, StoreError> {
        let outcomes =
            self.absence_by_indices(user_id, std::slice::from_ref(class), &[1]).await?;
        Ok(outcomes.first().map(|outcome| outcome.deleted).unwrap_or(false))
    }

    async fn record_action(&self, user_id: &UserId, kind: ActionKind, affected: &[ClassId]) {
        if affected.is_empty() {
            return;
        }

        if let Err(error) = self.actions.append(user_id, kind, affected).await {
            tracing::warn!(
                event_name = "attendance.audit_append_failed",
                user_id = %user_id.0,
                action = kind.as_str(),
                affected = affected.len(),
                error = %error,
                "audit log write failed; the mutation stands but /undo cannot revert it"
            );
        }
    }
}
