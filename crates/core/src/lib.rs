pub mod attendance;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod selection;
pub mod store;
pub mod undo;

pub use chrono;

pub use attendance::AttendanceService;
pub use clock::OperatingTz;
pub use domain::action::{ActionId, ActionKind, AttendanceAction};
pub use domain::attendance::{
    AttendanceEntry, ClassAbsenceOutcome, ClassMarkOutcome, CourseAttendanceSummary, DeleteResult,
    EffectiveCourseAttendance, MarkResult, MarkStatus, StatusResult,
};
pub use domain::schedule::{BatchId, ClassId, ClassRecord, CourseId, Enrollment, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use selection::SelectionMask;
pub use store::{
    ActionLog, AttendanceStore, ChatDirectory, ScheduleStore, StoreError,
};
pub use undo::{UndoEngine, UndoOutcome};
