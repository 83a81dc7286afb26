use chrono::NaiveDate;
use thiserror::Error;

use rollcall_core::domain::action::ActionKind;
use rollcall_core::selection::{SelectionMask, MAX_SELECTABLE_CLASSES};

/// One decoded inline-keyboard payload: `<action>:<date>:<arg2>:<arg3>`.
///
/// The mask and index only reflect the schedule as it looked when the
/// keyboard was rendered; handlers must re-validate both against the
/// freshly resolved schedule, since payloads may be stale or replayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackPayload {
    Select { date: NaiveDate, index: usize, mask: SelectionMask },
    Confirm { date: NaiveDate, kind: ActionKind, mask: SelectionMask },
    AttendAll { date: NaiveDate },
    AbsentAll { date: NaiveDate },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload has the wrong number of segments")]
    WrongSegmentCount,
    #[error("unknown callback action `{0}`")]
    UnknownAction(String),
    #[error("malformed date `{0}` (expected YYYY-MM-DD)")]
    MalformedDate(String),
    #[error("malformed class index `{0}`")]
    MalformedIndex(String),
    #[error("class index {0} exceeds the selectable maximum")]
    IndexOutOfRange(usize),
    #[error("malformed selection mask `{0}`")]
    MalformedMask(String),
    #[error("unknown confirm kind `{0}`")]
    UnknownConfirmKind(String),
}

impl CallbackPayload {
    pub fn encode(&self) -> String {
        match self {
            Self::Select { date, index, mask } => {
                format!("select:{}:{index}:{}", format_date(*date), mask.bits())
            }
            Self::Confirm { date, kind, mask } => {
                format!("confirm:{}:{}:{}", format_date(*date), kind.as_str(), mask.bits())
            }
            Self::AttendAll { date } => format!("attend-all:{}", format_date(*date)),
            Self::AbsentAll { date } => format!("absent-all:{}", format_date(*date)),
        }
    }

    pub fn parse(data: &str) -> Result<Self, PayloadError> {
        let segments: Vec<&str> = data.split(':').collect();
        let action = segments.first().copied().ok_or(PayloadError::WrongSegmentCount)?;

        match action {
            "select" => {
                if segments.len() != 4 {
                    return Err(PayloadError::WrongSegmentCount);
                }
                Ok(Self::Select {
                    date: parse_date(segments[1])?,
                    index: parse_index(segments[2])?,
                    mask: parse_mask(segments[3])?,
                })
            }
            "confirm" => {
                if segments.len() != 4 {
                    return Err(PayloadError::WrongSegmentCount);
                }
                let kind = ActionKind::parse(segments[2])
                    .ok_or_else(|| PayloadError::UnknownConfirmKind(segments[2].to_owned()))?;
                Ok(Self::Confirm {
                    date: parse_date(segments[1])?,
                    kind,
                    mask: parse_mask(segments[3])?,
                })
            }
            "attend-all" => {
                if segments.len() != 2 {
                    return Err(PayloadError::WrongSegmentCount);
                }
                Ok(Self::AttendAll { date: parse_date(segments[1])? })
            }
            "absent-all" => {
                if segments.len() != 2 {
                    return Err(PayloadError::WrongSegmentCount);
                }
                Ok(Self::AbsentAll { date: parse_date(segments[1])? })
            }
            other => Err(PayloadError::UnknownAction(other.to_owned())),
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, PayloadError> {
    // strict YYYY-MM-DD shape before the calendar check, so "2026-8-7" and
    // trailing garbage are rejected rather than leniently parsed
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| {
            if i == 4 || i == 7 {
                true
            } else {
                b.is_ascii_digit()
            }
        });
    if !shaped {
        return Err(PayloadError::MalformedDate(value.to_owned()));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PayloadError::MalformedDate(value.to_owned()))
}

fn parse_index(value: &str) -> Result<usize, PayloadError> {
    let index =
        value.parse::<usize>().map_err(|_| PayloadError::MalformedIndex(value.to_owned()))?;
    if index >= MAX_SELECTABLE_CLASSES {
        return Err(PayloadError::IndexOutOfRange(index));
    }
    Ok(index)
}

fn parse_mask(value: &str) -> Result<SelectionMask, PayloadError> {
    value
        .parse::<u32>()
        .map(SelectionMask::from_bits)
        .map_err(|_| PayloadError::MalformedMask(value.to_owned()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use rollcall_core::domain::action::ActionKind;
    use rollcall_core::selection::SelectionMask;

    use super::{CallbackPayload, PayloadError};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date")
    }

    #[test]
    fn payloads_round_trip() {
        let payloads = [
            CallbackPayload::Select { date: date(), index: 3, mask: SelectionMask::from_bits(5) },
            CallbackPayload::Confirm {
                date: date(),
                kind: ActionKind::Attend,
                mask: SelectionMask::from_bits(6),
            },
            CallbackPayload::Confirm {
                date: date(),
                kind: ActionKind::Absent,
                mask: SelectionMask::from_bits(1),
            },
            CallbackPayload::AttendAll { date: date() },
            CallbackPayload::AbsentAll { date: date() },
        ];

        for payload in payloads {
            let encoded = payload.encode();
            assert_eq!(CallbackPayload::parse(&encoded).expect("parse"), payload, "{encoded}");
        }
    }

    #[test]
    fn select_encodes_the_documented_shape() {
        let payload =
            CallbackPayload::Select { date: date(), index: 2, mask: SelectionMask::from_bits(5) };
        assert_eq!(payload.encode(), "select:2026-08-07:2:5");
    }

    #[test]
    fn rejects_unknown_actions_and_segment_counts() {
        assert_eq!(
            CallbackPayload::parse("detonate:2026-08-07:1:1").expect_err("unknown action"),
            PayloadError::UnknownAction("detonate".to_owned())
        );
        assert_eq!(
            CallbackPayload::parse("select:2026-08-07:1").expect_err("missing mask"),
            PayloadError::WrongSegmentCount
        );
        assert_eq!(
            CallbackPayload::parse("attend-all:2026-08-07:extra").expect_err("extra segment"),
            PayloadError::WrongSegmentCount
        );
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in ["select:2026-8-7:1:1", "select:07-08-2026:1:1", "select:2026-13-40:1:1"] {
            assert!(
                matches!(
                    CallbackPayload::parse(raw),
                    Err(PayloadError::MalformedDate(_))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_bad_indices_and_masks() {
        assert_eq!(
            CallbackPayload::parse("select:2026-08-07:32:0").expect_err("index too large"),
            PayloadError::IndexOutOfRange(32)
        );
        assert_eq!(
            CallbackPayload::parse("select:2026-08-07:-1:0").expect_err("negative index"),
            PayloadError::MalformedIndex("-1".to_owned())
        );
        assert_eq!(
            CallbackPayload::parse("select:2026-08-07:1:-5").expect_err("negative mask"),
            PayloadError::MalformedMask("-5".to_owned())
        );
        assert_eq!(
            CallbackPayload::parse("confirm:2026-08-07:present:1").expect_err("bad kind"),
            PayloadError::UnknownConfirmKind("present".to_owned())
        );
    }
}
