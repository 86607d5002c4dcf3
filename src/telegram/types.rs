// Bot API wire types - only the fields this bot reads

use serde::{Deserialize, Serialize};

use crate::messenger::InboundEvent;

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Callback-query id to acknowledge, when this update carries one.
    pub fn callback_ack_id(&self) -> Option<String> {
        self.callback_query.as_ref().map(|cb| cb.id.clone())
    }

    /// Map onto the platform-neutral event model. Service updates the bot
    /// has no use for map to nothing.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        if let Some(callback) = self.callback_query {
            let message = callback.message?;
            let token = callback.data?;
            return Some(InboundEvent::ControlPressed {
                chat: message.chat.id,
                user: callback.from.id,
                message: message.message_id,
                token,
            });
        }

        let message = self.message?;
        let chat = message.chat.id;
        let user = message.from.map(|u| u.id).unwrap_or(chat);

        if let Some(document) = message.document {
            return Some(InboundEvent::DocumentUpload {
                chat,
                user,
                file_name: document.file_name.unwrap_or_default(),
            });
        }

        let text = message.text?;
        Some(InboundEvent::TextMessage { chat, user, text })
    }
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub result: Option<T>,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}
