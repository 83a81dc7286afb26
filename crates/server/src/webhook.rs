use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};

use rollcall_core::store::ChatDirectory;
use rollcall_core::ApplicationError;
use rollcall_telegram::api::{
    AnswerCallbackQuery, BotTransport, EditMessageReplyMarkup, EditMessageText, ParseMode,
    SendMessage, Update,
};
use rollcall_telegram::commands::{
    parse_command, CallbackOutcome, CommandContext, CommandRouter, MessageEdit,
};
use rollcall_telegram::messages::{self, Reply};

use crate::service::BotService;

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct WebhookState {
    router: Arc<CommandRouter<BotService>>,
    chats: Arc<dyn ChatDirectory>,
    transport: Arc<dyn BotTransport>,
    webhook_secret: SecretString,
}

impl WebhookState {
    pub fn new(
        router: Arc<CommandRouter<BotService>>,
        chats: Arc<dyn ChatDirectory>,
        transport: Arc<dyn BotTransport>,
        webhook_secret: SecretString,
    ) -> Self {
        Self { router, chats, transport, webhook_secret }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/telegram/webhook", post(receive_update)).with_state(state)
}

/// Webhook entry point. Always answers 200 once the secret checks out:
/// Telegram redelivers non-2xx responses, and while redelivery is exactly
/// the duplicate-invocation case the idempotent mutation path absorbs,
/// there is no point inviting it for handler-level failures we already
/// reported to the user.
async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !secret_matches(&headers, &state.webhook_secret) {
        tracing::warn!(
            event_name = "webhook.rejected",
            update_id = update.update_id,
            "webhook delivery with missing or wrong secret token"
        );
        return StatusCode::UNAUTHORIZED;
    }

    handle_update(&state, update).await;
    StatusCode::OK
}

fn secret_matches(headers: &HeaderMap, expected: &SecretString) -> bool {
    let Some(provided) = headers.get(SECRET_TOKEN_HEADER).and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    constant_time_eq(provided.as_bytes(), expected.expose_secret().as_bytes())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

async fn handle_update(state: &WebhookState, update: Update) {
    if let Some(message) = update.message {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let Some(command) = parse_command(text) else {
            // non-command chatter is ignored
            return;
        };

        let chat_id = message.chat.id;
        let ctx = match resolve_context(state, chat_id).await {
            Ok(ctx) => ctx,
            Err(reply) => {
                deliver_reply(state, chat_id, reply).await;
                return;
            }
        };

        let reply = match state.router.route_command(command, &ctx).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(
                    event_name = "webhook.command_failed",
                    chat_id,
                    error = %error,
                    "command handler failed; replying with a retry hint"
                );
                let interface = ApplicationError::Integration(error.to_string())
                    .into_interface(format!("update-{}", update.update_id));
                Reply::plain(interface.user_message())
            }
        };

        deliver_reply(state, chat_id, reply).await;
    } else if let Some(query) = update.callback_query {
        let Some(message) = query.message.as_ref() else {
            return;
        };
        let Some(data) = query.data.as_deref() else {
            return;
        };

        let chat_id = message.chat.id;
        let ctx = match resolve_context(state, chat_id).await {
            Ok(ctx) => ctx,
            Err(_) => CommandContext { chat_id, user_id: None },
        };

        let outcome = match state.router.route_callback(data, &ctx).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(
                    event_name = "webhook.callback_failed",
                    chat_id,
                    error = %error,
                    "callback handler failed; answering with a retry hint"
                );
                CallbackOutcome::alert(messages::TRY_AGAIN_ANSWER)
            }
        };

        deliver_callback_outcome(state, chat_id, message.message_id, &query.id, outcome).await;
    }
}

async fn resolve_context(state: &WebhookState, chat_id: i64) -> Result<CommandContext, Reply> {
    match state.chats.user_for_chat(chat_id).await {
        Ok(user_id) => Ok(CommandContext { chat_id, user_id }),
        Err(error) => {
            tracing::error!(
                event_name = "webhook.chat_lookup_failed",
                chat_id,
                error = %error,
                "chat link lookup failed"
            );
            Err(messages::try_again())
        }
    }
}

async fn deliver_reply(state: &WebhookState, chat_id: i64, reply: Reply) {
    let request = SendMessage {
        chat_id,
        text: reply.text,
        parse_mode: reply.parse_mode,
        reply_markup: reply.keyboard,
    };

    if let Err(error) = state.transport.send_message(request).await {
        tracing::error!(
            event_name = "webhook.send_failed",
            chat_id,
            error = %error,
            "outbound reply could not be delivered"
        );
    }
}

async fn deliver_callback_outcome(
    state: &WebhookState,
    chat_id: i64,
    message_id: i64,
    callback_query_id: &str,
    outcome: CallbackOutcome,
) {
    match outcome.edit {
        Some(MessageEdit::Markup { keyboard }) => {
            let request = EditMessageReplyMarkup { chat_id, message_id, reply_markup: keyboard };
            if let Err(error) = state.transport.edit_message_reply_markup(request).await {
                tracing::error!(
                    event_name = "webhook.edit_failed",
                    chat_id,
                    error = %error,
                    "keyboard edit could not be delivered"
                );
            }
        }
        Some(MessageEdit::Text { text, markdown }) => {
            let request = EditMessageText {
                chat_id,
                message_id,
                text,
                parse_mode: markdown.then_some(ParseMode::Markdown),
            };
            if let Err(error) = state.transport.edit_message_text(request).await {
                tracing::error!(
                    event_name = "webhook.edit_failed",
                    chat_id,
                    error = %error,
                    "message edit could not be delivered"
                );
            }
        }
        None => {}
    }

    let answer = AnswerCallbackQuery {
        callback_query_id: callback_query_id.to_owned(),
        text: outcome.answer,
        show_alert: outcome.show_alert,
    };
    if let Err(error) = state.transport.answer_callback_query(answer).await {
        tracing::error!(
            event_name = "webhook.answer_failed",
            chat_id,
            error = %error,
            "callback answer could not be delivered"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use rollcall_core::clock::OperatingTz;
    use rollcall_core::domain::schedule::UserId;
    use rollcall_core::store::{
        ChatDirectory, InMemoryActionLog, InMemoryAttendanceStore, InMemoryChatDirectory,
        InMemoryScheduleStore,
    };
    use rollcall_telegram::api::{
        AnswerCallbackQuery, BotTransport, EditMessageReplyMarkup, EditMessageText, SendMessage,
        TransportError,
    };
    use rollcall_telegram::commands::CommandRouter;

    use crate::service::BotService;

    use super::{router, WebhookState};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<SendMessage>>,
        answers: Mutex<Vec<AnswerCallbackQuery>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<SendMessage> {
            match self.sent.lock() {
                Ok(sent) => sent.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }

        fn answers(&self) -> Vec<AnswerCallbackQuery> {
            match self.answers.lock() {
                Ok(answers) => answers.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }
    }

    #[async_trait]
    impl BotTransport for RecordingTransport {
        async fn send_message(&self, request: SendMessage) -> Result<(), TransportError> {
            match self.sent.lock() {
                Ok(mut sent) => sent.push(request),
                Err(poisoned) => poisoned.into_inner().push(request),
            }
            Ok(())
        }

        async fn edit_message_text(
            &self,
            _request: EditMessageText,
        ) -> Result<(), TransportError> {
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
            request: AnswerCallbackQuery,
        ) -> Result<(), TransportError> {
            match self.answers.lock() {
                Ok(mut answers) => answers.push(request),
                Err(poisoned) => poisoned.into_inner().push(request),
            }
            Ok(())
        }
    }

    async fn state_with_transport() -> (WebhookState, Arc<RecordingTransport>) {
        let attendance = Arc::new(InMemoryAttendanceStore::default());
        let schedule = Arc::new(InMemoryScheduleStore::default());
        let actions = Arc::new(InMemoryActionLog::default());
        let chats = Arc::new(InMemoryChatDirectory::default());
        chats.link_chat(42, &UserId("u1".to_owned())).await.expect("link chat");

        let service = BotService::new(attendance, schedule, actions, OperatingTz::default(), None);
        let transport = Arc::new(RecordingTransport::default());

        (
            WebhookState::new(
                Arc::new(CommandRouter::new(service)),
                chats,
                transport.clone(),
                "hook-secret".to_owned().into(),
            ),
            transport,
        )
    }

    fn update_request(secret: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/telegram/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header("x-telegram-bot-api-secret-token", secret);
        }
        builder.body(Body::from(body.to_owned())).expect("request")
    }

    const MESSAGE_UPDATE: &str = r#"{"update_id": 1, "message": {"message_id": 10,
        "chat": {"id": 42}, "from": {"id": 7}, "text": "/today"}}"#;

    #[tokio::test]
    async fn deliveries_without_the_secret_are_rejected() {
        let (state, transport) = state_with_transport().await;
        let app = router(state);

        let missing =
            app.clone().oneshot(update_request(None, MESSAGE_UPDATE)).await.expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(update_request(Some("not-the-secret"), MESSAGE_UPDATE))
            .await
            .expect("response");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        assert!(transport.sent().is_empty(), "no reply may be sent for rejected deliveries");
    }

    #[tokio::test]
    async fn command_updates_produce_a_reply() {
        let (state, transport) = state_with_transport().await;
        let app = router(state);

        let response = app
            .oneshot(update_request(Some("hook-secret"), MESSAGE_UPDATE))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 42);
        // no schedule seeded, so the empty-day reply is expected
        assert!(sent[0].text.contains("no classes scheduled"));
    }

    #[tokio::test]
    async fn callback_updates_are_always_answered() {
        let (state, transport) = state_with_transport().await;
        let app = router(state);

        let callback = r#"{"update_id": 2, "callback_query": {"id": "cb-1", "from": {"id": 7},
            "message": {"message_id": 11, "chat": {"id": 42}},
            "data": "select:2026-99-99:0:0"}}"#;

        let response = app
            .oneshot(update_request(Some("hook-secret"), callback))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let answers = transport.answers();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].callback_query_id, "cb-1");
        assert_eq!(answers[0].text.as_deref(), Some("Invalid date"));
    }

    #[tokio::test]
    async fn non_command_chatter_is_ignored() {
        let (state, transport) = state_with_transport().await;
        let app = router(state);

        let chatter = r#"{"update_id": 3, "message": {"message_id": 12,
            "chat": {"id": 42}, "from": {"id": 7}, "text": "good morning"}}"#;

        let response =
            app.oneshot(update_request(Some("hook-secret"), chatter)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(transport.sent().is_empty());
    }
}
