use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use rollcall_telegram::api::{
    AnswerCallbackQuery, BotTransport, EditMessageReplyMarkup, EditMessageText, SendMessage,
    TransportError,
};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Outbound Bot API client. Delivery retries and rate limiting are
/// Telegram's side of the contract; this client reports failures and moves
/// on.
pub struct HttpBotTransport {
    http: reqwest::Client,
    method_base: String,
}

impl HttpBotTransport {
    pub fn new(bot_token: &SecretString) -> Self {
        Self::with_base_url(TELEGRAM_API_BASE, bot_token)
    }

    /// Points the client at a different API host. Tests use this against a
    /// local stub.
    pub fn with_base_url(base_url: &str, bot_token: &SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            method_base: format!(
                "{}/bot{}",
                base_url.trim_end_matches('/'),
                bot_token.expose_secret()
            ),
        }
    }

    async fn call<T: Serialize>(&self, method: &str, payload: &T) -> Result<(), TransportError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.method_base))
            .json(payload)
            .send()
            .await
            .map_err(|error| TransportError::Api(format!("{method}: {error}")))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|error| TransportError::Api(format!("{method} decode: {error}")))?;

        if !status.is_success() || !body.ok {
            let description = body.description.unwrap_or_else(|| status.to_string());
            return Err(TransportError::Api(format!("{method}: {description}")));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl BotTransport for HttpBotTransport {
    async fn send_message(&self, request: SendMessage) -> Result<(), TransportError> {
        self.call("sendMessage", &request).await
    }

    async fn edit_message_text(&self, request: EditMessageText) -> Result<(), TransportError> {
        self.call("editMessageText", &request).await
    }

    async fn edit_message_reply_markup(
        &self,
        request: EditMessageReplyMarkup,
    ) -> Result<(), TransportError> {
        self.call("editMessageReplyMarkup", &request).await
    }

    async fn answer_callback_query(
        &self,
        request: AnswerCallbackQuery,
    ) -> Result<(), TransportError> {
        self.call("answerCallbackQuery", &request).await
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::HttpBotTransport;

    #[test]
    fn method_urls_embed_the_token_once() {
        let token = SecretString::from("12345:token-value".to_owned());
        let transport = HttpBotTransport::with_base_url("https://example.test/", &token);

        assert_eq!(transport.method_base, "https://example.test/bot12345:token-value");
    }
}
