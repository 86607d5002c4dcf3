// Minimal Bot API client - just the handful of calls the bot makes
//
// Long-poll getUpdates drives the inbound stream; sendMessage /
// editMessageText / sendPhoto implement the Messenger boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{
    ApiResponse, IncomingMessage, InlineKeyboardButton, InlineKeyboardMarkup, Update,
};
use crate::messenger::{ChatId, Controls, MessageId, Messenger, MessengerError};

/// Long-poll window for getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

pub struct TelegramApi {
    http: reqwest::Client,
    base: String,
}

impl TelegramApi {
    pub fn new(token: &str, proxy: Option<&str>) -> Result<Self, MessengerError> {
        // request timeout must outlast the long-poll window
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| MessengerError::Transport(format!("bad proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| MessengerError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base: format!("https://api.telegram.org/bot{}", token),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, MessengerError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(payload)
            .send()
            .await
            .map_err(|e| MessengerError::Transport(e.to_string()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| MessengerError::Transport(e.to_string()))?;

        if !body.ok {
            return Err(MessengerError::Rejected(
                body.description.unwrap_or_else(|| "no description".to_string()),
            ));
        }
        body.result
            .ok_or_else(|| MessengerError::Rejected("empty result".to_string()))
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, MessengerError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Stop the client-side button spinner; failures are harmless.
    pub async fn answer_callback(&self, callback_id: &str) {
        let result: Result<bool, _> = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "answerCallbackQuery failed");
        }
    }
}

fn keyboard(controls: &Controls) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: controls
            .iter()
            .map(|row| {
                row.iter()
                    .map(|control| InlineKeyboardButton {
                        text: control.label.clone(),
                        callback_data: control.token.clone(),
                    })
                    .collect()
            })
            .collect(),
    }
}

#[async_trait]
impl Messenger for TelegramApi {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<Controls>,
    ) -> Result<MessageId, MessengerError> {
        let mut payload = json!({
            "chat_id": chat,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(controls) = controls {
            payload["reply_markup"] = serde_json::to_value(keyboard(&controls))
                .map_err(|e| MessengerError::Transport(e.to_string()))?;
        }

        let message: IncomingMessage = self.call("sendMessage", &payload).await?;
        Ok(message.message_id)
    }

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        controls: Option<Controls>,
    ) -> Result<(), MessengerError> {
        let mut payload = json!({
            "chat_id": chat,
            "message_id": message,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(controls) = controls {
            payload["reply_markup"] = serde_json::to_value(keyboard(&controls))
                .map_err(|e| MessengerError::Transport(e.to_string()))?;
        }

        // the API returns the edited Message; nothing in it is needed
        let _: serde_json::Value = self.call("editMessageText", &payload).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), MessengerError> {
        let payload = json!({
            "chat_id": chat,
            "photo": photo_url,
            "caption": caption,
        });
        let _: serde_json::Value = self.call("sendPhoto", &payload).await?;
        Ok(())
    }
}
