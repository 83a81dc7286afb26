use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keyboards::InlineKeyboardMarkup;

// ---------------------------------------------------------------------------
// Inbound update shapes (the subset of the Bot API this bot consumes)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// Outbound request payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EditMessageText {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EditMessageReplyMarkup {
    pub chat_id: i64,
    pub message_id: i64,
    pub reply_markup: InlineKeyboardMarkup,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerCallbackQuery {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram api call failed: {0}")]
    Api(String),
}

/// Outbound side of the Bot API. The server crate implements this over
/// HTTP; tests substitute a recording or no-op transport.
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn send_message(&self, request: SendMessage) -> Result<(), TransportError>;

    async fn edit_message_text(&self, request: EditMessageText) -> Result<(), TransportError>;

    async fn edit_message_reply_markup(
        &self,
        request: EditMessageReplyMarkup,
    ) -> Result<(), TransportError>;

    async fn answer_callback_query(
        &self,
        request: AnswerCallbackQuery,
    ) -> Result<(), TransportError>;
}

/// Swallows every outbound call. Used where a transport is required but
/// delivery is irrelevant.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl BotTransport for NoopTransport {
    async fn send_message(&self, _request: SendMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn edit_message_text(&self, _request: EditMessageText) -> Result<(), TransportError> {
        Ok(())
    }

    async fn edit_message_reply_markup(
        &self,
        _request: EditMessageReplyMarkup,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        _request: AnswerCallbackQuery,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}
