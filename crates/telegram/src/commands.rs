use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use rollcall_core::domain::action::ActionKind;
use rollcall_core::domain::schedule::UserId;
use rollcall_core::selection::SelectionMask;

use crate::callbacks::{CallbackPayload, PayloadError};
use crate::keyboards::InlineKeyboardMarkup;
use crate::messages::{self, Reply};

/// A parsed slash command. Index arguments are kept raw (any positive
/// integers the user typed); the service bounds them against the freshly
/// resolved schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Attend { indices: Vec<u32> },
    Absent { indices: Vec<u32> },
    AttendAll,
    AbsentAll,
    Today,
    Tomorrow,
    Status,
    Undo,
    Unknown { command: String },
}

/// Parses message text into a command. Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let head = parts.next()?;
    // "/attend@rollcall_bot" addresses this bot in a group chat
    let command = head
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    let parsed = match command.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "attend" | "a" => BotCommand::Attend { indices: parse_index_args(&args) },
        "absent" | "ab" => BotCommand::Absent { indices: parse_index_args(&args) },
        "attend_all" | "aa" => BotCommand::AttendAll,
        "absent_all" => BotCommand::AbsentAll,
        "today" => BotCommand::Today,
        "tomorrow" => BotCommand::Tomorrow,
        "status" | "s" => BotCommand::Status,
        "undo" | "u" => BotCommand::Undo,
        "" => return None,
        other => BotCommand::Unknown { command: other.to_owned() },
    };

    Some(parsed)
}

/// Splits argument tokens on commas and whitespace and keeps the positive
/// integers, preserving order.
fn parse_index_args(args: &[&str]) -> Vec<u32> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .filter_map(|token| token.trim().parse::<u32>().ok())
        .filter(|&value| value >= 1)
        .collect()
}

/// Per-update context resolved by the webhook layer before routing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub chat_id: i64,
    /// Linked account, if the chat has completed `/start`.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Error)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// How a callback handler responds: always an answer to the callback
/// query, optionally an edit of the originating message.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageEdit {
    Text { text: String, markdown: bool },
    Markup { keyboard: InlineKeyboardMarkup },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallbackOutcome {
    pub answer: Option<String>,
    pub show_alert: bool,
    pub edit: Option<MessageEdit>,
}

impl CallbackOutcome {
    pub fn silent() -> Self {
        Self { answer: None, show_alert: false, edit: None }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self { answer: Some(text.into()), show_alert: false, edit: None }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self { answer: Some(text.into()), show_alert: true, edit: None }
    }

    pub fn with_edit(mut self, edit: MessageEdit) -> Self {
        self.edit = Some(edit);
        self
    }
}

/// The application surface the router dispatches into. Implemented by the
/// server over the core engines; tests substitute recorders.
#[async_trait]
pub trait AttendanceCommandService: Send + Sync {
    async fn start(&self, ctx: &CommandContext) -> Result<Reply, CommandRouteError>;

    async fn attend(&self, user_id: &UserId, indices: &[u32]) -> Result<Reply, CommandRouteError>;

    async fn absent(&self, user_id: &UserId, indices: &[u32]) -> Result<Reply, CommandRouteError>;

    async fn attend_all(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn absent_all(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn today(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn tomorrow(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn status(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn undo(&self, user_id: &UserId) -> Result<Reply, CommandRouteError>;

    async fn select_class(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        index: usize,
        mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError>;

    async fn confirm_selection(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        kind: ActionKind,
        mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError>;

    async fn mark_all_from_callback(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        kind: ActionKind,
    ) -> Result<CallbackOutcome, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: AttendanceCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn route_command(
        &self,
        command: BotCommand,
        ctx: &CommandContext,
    ) -> Result<Reply, CommandRouteError> {
        if requires_link(&command) && ctx.user_id.is_none() {
            return Ok(messages::connect_prompt());
        }

        match command {
            BotCommand::Start => self.service.start(ctx).await,
            BotCommand::Help => Ok(messages::help()),
            BotCommand::Unknown { command } => Ok(messages::unknown_command(&command)),
            BotCommand::Attend { indices } => {
                self.service.attend(linked_user(ctx)?, &indices).await
            }
            BotCommand::Absent { indices } => {
                self.service.absent(linked_user(ctx)?, &indices).await
            }
            BotCommand::AttendAll => self.service.attend_all(linked_user(ctx)?).await,
            BotCommand::AbsentAll => self.service.absent_all(linked_user(ctx)?).await,
            BotCommand::Today => self.service.today(linked_user(ctx)?).await,
            BotCommand::Tomorrow => self.service.tomorrow(linked_user(ctx)?).await,
            BotCommand::Status => self.service.status(linked_user(ctx)?).await,
            BotCommand::Undo => self.service.undo(linked_user(ctx)?).await,
        }
    }

    /// Decodes and dispatches a callback payload. Malformed or replayed
    /// payloads are answered locally; no store call is made for them.
    pub async fn route_callback(
        &self,
        data: &str,
        ctx: &CommandContext,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        let payload = match CallbackPayload::parse(data) {
            Ok(payload) => payload,
            Err(error) => return Ok(CallbackOutcome::answer(payload_rejection(&error))),
        };

        let Some(user_id) = &ctx.user_id else {
            return Ok(CallbackOutcome::alert(messages::CONNECT_FIRST_ANSWER));
        };

        match payload {
            CallbackPayload::Select { date, index, mask } => {
                self.service.select_class(user_id, date, index, mask).await
            }
            CallbackPayload::Confirm { date, kind, mask } => {
                self.service.confirm_selection(user_id, date, kind, mask).await
            }
            CallbackPayload::AttendAll { date } => {
                self.service.mark_all_from_callback(user_id, date, ActionKind::Attend).await
            }
            CallbackPayload::AbsentAll { date } => {
                self.service.mark_all_from_callback(user_id, date, ActionKind::Absent).await
            }
        }
    }
}

fn requires_link(command: &BotCommand) -> bool {
    !matches!(
        command,
        BotCommand::Start | BotCommand::Help | BotCommand::Unknown { .. }
    )
}

fn linked_user(ctx: &CommandContext) -> Result<&UserId, CommandRouteError> {
    ctx.user_id.as_ref().ok_or_else(|| {
        CommandRouteError::Service(
            "update reached an authorized handler without a linked user".to_owned(),
        )
    })
}

fn payload_rejection(error: &PayloadError) -> &'static str {
    match error {
        PayloadError::MalformedDate(_) => "Invalid date",
        PayloadError::MalformedIndex(_) | PayloadError::IndexOutOfRange(_) => "Invalid selection",
        PayloadError::MalformedMask(_) => "Invalid selection",
        PayloadError::UnknownAction(_) | PayloadError::UnknownConfirmKind(_) => "Invalid action",
        PayloadError::WrongSegmentCount => "Invalid data format",
    }
}

/// Placeholder service used by router tests and wiring smoke checks; every
/// handler acknowledges without touching any store.
#[derive(Default)]
pub struct NoopAttendanceCommandService;

#[async_trait]
impl AttendanceCommandService for NoopAttendanceCommandService {
    async fn start(&self, _ctx: &CommandContext) -> Result<Reply, CommandRouteError> {
        Ok(messages::welcome(None))
    }

    async fn attend(
        &self,
        _user_id: &UserId,
        indices: &[u32],
    ) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain(format!("attend {indices:?}")))
    }

    async fn absent(
        &self,
        _user_id: &UserId,
        indices: &[u32],
    ) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain(format!("absent {indices:?}")))
    }

    async fn attend_all(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("attend all"))
    }

    async fn absent_all(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("absent all"))
    }

    async fn today(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("today"))
    }

    async fn tomorrow(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("tomorrow"))
    }

    async fn status(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("status"))
    }

    async fn undo(&self, _user_id: &UserId) -> Result<Reply, CommandRouteError> {
        Ok(Reply::plain("undo"))
    }

    async fn select_class(
        &self,
        _user_id: &UserId,
        _date: NaiveDate,
        _index: usize,
        _mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        Ok(CallbackOutcome::silent())
    }

    async fn confirm_selection(
        &self,
        _user_id: &UserId,
        _date: NaiveDate,
        _kind: ActionKind,
        _mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        Ok(CallbackOutcome::silent())
    }

    async fn mark_all_from_callback(
        &self,
        _user_id: &UserId,
        _date: NaiveDate,
        _kind: ActionKind,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        Ok(CallbackOutcome::silent())
    }
}
