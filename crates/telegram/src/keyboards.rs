use chrono::NaiveDate;
use serde::Serialize;

use rollcall_core::clock::OperatingTz;
use rollcall_core::domain::action::ActionKind;
use rollcall_core::domain::schedule::ClassRecord;
use rollcall_core::selection::SelectionMask;

use crate::callbacks::CallbackPayload;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: Some(data.into()), url: None }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: None, url: Some(url.into()) }
    }
}

/// The multi-select attendance keyboard: one row per class with a
/// check/uncheck toggle, a confirm row shown only once something is
/// selected, and the attend-all/absent-all row. Each toggle button carries
/// the mask it was rendered from; the handler flips the tapped bit.
pub fn build_attendance_keyboard(
    classes: &[ClassRecord],
    date: NaiveDate,
    mask: SelectionMask,
    tz: &OperatingTz,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::with_capacity(classes.len() + 2);

    for (index, class) in classes.iter().enumerate() {
        let check = if mask.contains(index) { "✅ " } else { "⬜ " };
        let label = format!("{check}{} ({})", class.course_name, tz.clock_label(class.start_time));
        let payload = CallbackPayload::Select { date, index, mask };
        rows.push(vec![InlineKeyboardButton::callback(label, payload.encode())]);
    }

    if !mask.is_empty() {
        rows.push(vec![
            InlineKeyboardButton::callback(
                "Attend Selected 🙋",
                CallbackPayload::Confirm { date, kind: ActionKind::Attend, mask }.encode(),
            ),
            InlineKeyboardButton::callback(
                "Absent Selected 🙅",
                CallbackPayload::Confirm { date, kind: ActionKind::Absent, mask }.encode(),
            ),
        ]);
    }

    rows.push(vec![
        InlineKeyboardButton::callback(
            "Attend All 🚀",
            CallbackPayload::AttendAll { date }.encode(),
        ),
        InlineKeyboardButton::callback(
            "Absent All 😴",
            CallbackPayload::AbsentAll { date }.encode(),
        ),
    ]);

    InlineKeyboardMarkup { inline_keyboard: rows }
}

/// Single-button keyboard linking a chat to its account.
pub fn connect_keyboard(connect_url: impl Into<String>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton::url("🔗 Connect Account", connect_url)]],
    }
}
