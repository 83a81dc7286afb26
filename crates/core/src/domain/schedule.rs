use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

/// One scheduled class occurrence. Owned by the scheduling store; read-only
/// from this crate's point of view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub class_id: ClassId,
    pub course_id: CourseId,
    pub course_name: String,
    pub is_lab: bool,
    pub class_date: NaiveDate,
    pub batch_id: BatchId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub venue: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub batch_id: BatchId,
    pub course_ids: Vec<CourseId>,
}

/// Pairs each 1-based index with its class record by direct positional
/// lookup. Indices must already be validated against `classes.len()`;
/// see [`filter_valid_indices`].
pub fn resolve_indices<'a>(
    classes: &'a [ClassRecord],
    indices: &[usize],
) -> Vec<(usize, &'a ClassRecord)> {
    indices.iter().map(|&index| (index, &classes[index - 1])).collect()
}

/// Keeps only indices inside `[1, class_count]`, preserving caller order.
pub fn filter_valid_indices(raw: &[u32], class_count: usize) -> Vec<usize> {
    raw.iter()
        .map(|&value| value as usize)
        .filter(|&index| index >= 1 && index <= class_count)
        .collect()
}

/// Finds a class that is ongoing at `now`, or one starting within the next
/// ten minutes. Used to pre-select the likely target on the selection
/// keyboard.
pub fn find_next_class(classes: &[ClassRecord], now: DateTime<Utc>) -> Option<&ClassRecord> {
    let window = Duration::minutes(10);

    classes.iter().find(|class| {
        let ongoing = now >= class.start_time && now <= class.end_time;
        let imminent = class.start_time > now && class.start_time - now <= window;
        ongoing || imminent
    })
}
