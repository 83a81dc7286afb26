use rollcall_core::clock::OperatingTz;
use rollcall_core::domain::action::ActionKind;
use rollcall_core::domain::attendance::{ClassMarkOutcome, CourseAttendanceSummary, MarkStatus};
use rollcall_core::domain::schedule::ClassRecord;
use rollcall_core::undo::UndoOutcome;

use crate::api::ParseMode;
use crate::keyboards::{connect_keyboard, InlineKeyboardMarkup};

/// One rendered outbound message: text plus optional formatting and
/// keyboard. The transport decides nothing; everything user-visible is
/// fixed here.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: None, keyboard: None }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: Some(ParseMode::Markdown), keyboard: None }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

// Short callback-answer texts.
pub const CONNECT_FIRST_ANSWER: &str = "Please connect your account using /start";
pub const NO_CLASSES_FOUND_ANSWER: &str = "No classes found for this date.";
pub const INVALID_SELECTION_ANSWER: &str = "Invalid class selection";
pub const NOTHING_SELECTED_ANSWER: &str = "⚠️ No classes selected!";
pub const TRY_AGAIN_ANSWER: &str = "Something didn't go through. Try again in a moment.";

pub fn try_again() -> Reply {
    Reply::plain(TRY_AGAIN_ANSWER)
}

pub fn connect_prompt() -> Reply {
    Reply::plain(
        "⚠️ You need to connect your account first.\n\nUse /start to link your Telegram with \
         your attendance profile.",
    )
}

pub fn already_connected() -> Reply {
    Reply::plain(
        "✅ You are already connected.\n\nYour account is active and ready to use. Type /help \
         to see available commands.",
    )
}

pub fn welcome(connect_url: Option<&str>) -> Reply {
    let reply = Reply::markdown(
        "👋 *Welcome to Rollcall*\n\nI'm your attendance assistant. To get started, link your \
         Telegram account with your attendance profile.",
    );

    match connect_url {
        Some(url) => reply.with_keyboard(connect_keyboard(url)),
        None => reply,
    }
}

pub fn help() -> Reply {
    Reply::markdown(
        "*Commands*\n\n\
         /attend `[numbers]` - mark classes present (alias /a)\n\
         /absent `[numbers]` - mark classes absent (alias /ab)\n\
         /attend\\_all - mark every class today present (alias /aa)\n\
         /absent\\_all - mark every class today absent\n\
         /today - today's schedule\n\
         /tomorrow - tomorrow's schedule\n\
         /status - course-wise attendance (alias /s)\n\
         /undo - revert your last action today (alias /u)",
    )
}

pub fn unknown_command(command: &str) -> Reply {
    Reply::plain(format!("I don't know /{command}. Type /help to see available commands."))
}

pub fn no_classes_today() -> Reply {
    Reply::plain("📭 You have no classes scheduled for today.")
}

pub fn no_classes_tomorrow() -> Reply {
    Reply::plain("No classes scheduled for tomorrow.")
}

pub fn invalid_class_numbers() -> Reply {
    Reply::plain("I couldn't find those class numbers. Use /today to see your schedule.")
}

fn pluralize(count: usize) -> &'static str {
    if count == 1 {
        "class"
    } else {
        "classes"
    }
}

/// Compact mark summary: counts up front, per-class lines only when
/// something failed.
pub fn mark_summary(outcomes: &[ClassMarkOutcome]) -> Reply {
    let marked = outcomes.iter().filter(|o| o.status == MarkStatus::Marked).count();
    let already = outcomes.iter().filter(|o| o.status == MarkStatus::Already).count();
    let failed = outcomes.iter().filter(|o| o.status == MarkStatus::Failed).count();

    let mut summary = format!("Marked {marked} {} present", pluralize(marked));
    if already > 0 {
        summary.push_str(&format!(" ({already} already marked)"));
    }

    if failed > 0 {
        summary.push_str("\n");
        for outcome in outcomes {
            let line = match outcome.status {
                MarkStatus::Marked => format!("\n{}. {} - Marked ✅", outcome.index, outcome.course_name),
                MarkStatus::Already => {
                    format!("\n{}. {} - Already marked ✓", outcome.index, outcome.course_name)
                }
                MarkStatus::Failed => {
                    format!("\n{}. {} - Failed ❌", outcome.index, outcome.course_name)
                }
            };
            summary.push_str(&line);
        }
    }

    summary.push_str("\n\n_Use /undo to revert if needed._");
    Reply::markdown(summary)
}

pub fn single_mark(course_name: &str, status: MarkStatus) -> Reply {
    match status {
        MarkStatus::Marked => Reply::markdown(format!(
            "Marked present.\n\n{course_name}\n\n_Use /undo to revert if needed._"
        )),
        MarkStatus::Already => {
            Reply::plain(format!("Already marked present for {course_name}."))
        }
        MarkStatus::Failed => try_again(),
    }
}

pub fn absence_summary(count: usize) -> Reply {
    Reply::markdown(format!(
        "Marked {count} {} absent.\n\n_Use /undo to revert if needed._",
        pluralize(count)
    ))
}

pub fn single_absence(course_name: &str) -> Reply {
    Reply::markdown(format!(
        "Marked absent.\n\n{course_name}\n\n_Use /undo to revert if needed._"
    ))
}

pub fn attend_selection_prompt(preselected_course: Option<&str>) -> Reply {
    match preselected_course {
        Some(course_name) => Reply::markdown(format!(
            "*Current/Upcoming Class Pre-selected*\n\n{course_name} is starting soon.\n\nTap to \
             adjust selection, then confirm."
        )),
        None => Reply::markdown(
            "*Select classes to mark present:*\nTap to select, then confirm. Or: /attend 1 2",
        ),
    }
}

pub fn absent_selection_prompt() -> Reply {
    Reply::markdown(
        "*Select classes to mark absent:*\nTap to select, then confirm. Or: /absent 1 2",
    )
}

/// Schedule listing; `statuses` aligns with `classes` when the listing
/// decorates marked state (today), and is `None` for plain listings
/// (tomorrow).
pub fn schedule_listing(
    title: &str,
    classes: &[ClassRecord],
    statuses: Option<&[bool]>,
    tz: &OperatingTz,
) -> Reply {
    let mut listing = format!("*{title}*\n\n");

    for (position, class) in classes.iter().enumerate() {
        let start = tz.clock_label(class.start_time);
        let end = tz.clock_label(class.end_time);

        listing.push_str(&format!("{}. *{}*", position + 1, class.course_name));
        if let Some(statuses) = statuses {
            let mark = if statuses.get(position).copied().unwrap_or(false) { "✅" } else { "⏸️" };
            listing.push_str(&format!(" {mark}"));
        }
        listing.push_str(&format!("\n   ⏰ {start} - {end}\n"));
        if let Some(venue) = &class.venue {
            listing.push_str(&format!("   📍 {venue}\n"));
        }
        listing.push('\n');
    }

    Reply::markdown(listing.trim_end().to_owned())
}

pub fn status_report(courses: &[CourseAttendanceSummary]) -> Reply {
    let mut report = String::from("*Your Attendance*\n\n");

    for course in courses {
        let lab_tag = if course.is_lab { " 🧪" } else { "" };
        report.push_str(&format!(
            "{}{lab_tag}\n  {} / {} ({}%)\n\n",
            course.course_name, course.attended, course.total, course.percentage
        ));
    }

    report.push_str("_Updated in real-time as you mark attendance._");
    Reply::markdown(report)
}

pub fn no_courses() -> Reply {
    Reply::plain("❌ No courses found.")
}

pub fn undo_reply(outcome: &UndoOutcome) -> Reply {
    match outcome {
        UndoOutcome::NothingToUndo => {
            Reply::plain("Nothing to undo. All actions are from previous days.")
        }
        UndoOutcome::StaleAction { action_date } => Reply::plain(format!(
            "Can only undo today's actions. Last action was on {action_date}."
        )),
        UndoOutcome::NothingRestorable => Reply::plain(
            "Couldn't restore that absence: those classes are no longer on your schedule. \
             Nothing was changed.",
        ),
        UndoOutcome::Reverted { kind, class_count } => {
            let verb = match kind {
                ActionKind::Attend => "attendance",
                ActionKind::Absent => "absence",
            };
            Reply::plain(format!("Undid {verb} for {class_count} {}.", pluralize(*class_count)))
        }
    }
}

// Edit texts shown after a keyboard confirmation replaces the selection
// message.

pub fn confirm_attend_edit(selected: usize, marked: usize, already: usize, failed: usize) -> String {
    format!(
        "✅ *Attendance Marked*\n\nSelected: {selected}\nNew: {marked} | Existing: {already} | \
         Failed: {failed}\n\n_Your stats will reflect this immediately._"
    )
}

pub fn confirm_absent_edit(count: usize) -> String {
    format!("📝 *Absence Recorded*\n\nMarked absent for {count} selected {}.", pluralize(count))
}

pub fn attend_all_edit(total: usize, marked: usize, already: usize) -> String {
    format!(
        "✅ *All Attendance Marked*\n\nTotal: {total}\nNew: {marked} | Existing: {already}\n\n\
         _Your stats will reflect this immediately._"
    )
}

pub fn absent_all_edit(total: usize) -> String {
    format!("📝 *All Absences Recorded*\n\nMarked absent for all {total} {}.", pluralize(total))
}
