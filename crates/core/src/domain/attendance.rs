use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::{ClassId, CourseId};

/// Per-class outcome of a bulk "mark present" call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkStatus {
    Marked,
    Already,
    Failed,
}

impl MarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marked => "marked",
            Self::Already => "already",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "marked" => Some(Self::Marked),
            "already" => Some(Self::Already),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkResult {
    pub class_id: ClassId,
    pub status: MarkStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub class_id: ClassId,
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub class_id: ClassId,
    pub is_marked: bool,
}

/// One class in a bulk mark request: the identifiers and scheduled time the
/// store persists alongside the check-in timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub class_id: ClassId,
    pub course_id: CourseId,
    pub class_time: DateTime<Utc>,
}

/// A mark outcome zipped back to its schedule position and display name,
/// ready for reply rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMarkOutcome {
    pub index: usize,
    pub class_id: ClassId,
    pub course_name: String,
    pub status: MarkStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassAbsenceOutcome {
    pub index: usize,
    pub class_id: ClassId,
    pub course_name: String,
    pub deleted: bool,
}

/// Output shape of the opaque effective-attendance read: a historical
/// snapshot merged with post-snapshot deltas, per course.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveCourseAttendance {
    pub course_id: CourseId,
    pub course_name: String,
    pub is_lab: bool,
    pub effective_attended_classes: u32,
    pub effective_total_classes: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CourseAttendanceSummary {
    pub course_id: CourseId,
    pub course_name: String,
    pub is_lab: bool,
    pub attended: u32,
    pub total: u32,
    pub percentage: f64,
}

impl From<EffectiveCourseAttendance> for CourseAttendanceSummary {
    fn from(course: EffectiveCourseAttendance) -> Self {
        let percentage = if course.effective_total_classes > 0 {
            let ratio = f64::from(course.effective_attended_classes)
                / f64::from(course.effective_total_classes);
            (ratio * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            course_id: course.course_id,
            course_name: course.course_name,
            is_lab: course.is_lab,
            attended: course.effective_attended_classes,
            total: course.effective_total_classes,
            percentage,
        }
    }
}
