use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::{ClassId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

/// What kind of mutation an audit entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Attend,
    Absent,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attend => "attend",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "attend" => Some(Self::Attend),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

/// One append-only audit entry. Entries are never mutated; they are created
/// after a successful mutation and deleted exactly once when the undo engine
/// consumes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceAction {
    pub id: ActionId,
    pub user_id: UserId,
    pub kind: ActionKind,
    pub affected_class_ids: Vec<ClassId>,
    pub created_at: DateTime<Utc>,
}
