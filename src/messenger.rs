// Chat platform boundary
//
// The pipeline never talks to a concrete chat API; it goes through this
// trait, so the interactive surface stays swappable and the dispatch
// logic testable without network access.

use async_trait::async_trait;
use thiserror::Error;

pub type ChatId = i64;
pub type MessageId = i64;
pub type UserId = i64;

/// One inline button: a label and the selection token it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub token: String,
}

/// Button rows attached to a message.
pub type Controls = Vec<Vec<Control>>;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("platform rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a new message, optionally with controls. Returns the new
    /// message's id, which keys the selection session.
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<Controls>,
    ) -> Result<MessageId, MessengerError>;

    /// Edit an existing message; passing no controls removes its keyboard.
    async fn edit(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        controls: Option<Controls>,
    ) -> Result<(), MessengerError>;

    /// Send a photo by URL with a caption.
    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), MessengerError>;
}

/// Inbound platform events, already filtered by the upstream allowlist.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    TextMessage {
        chat: ChatId,
        user: UserId,
        text: String,
    },
    DocumentUpload {
        chat: ChatId,
        user: UserId,
        file_name: String,
    },
    ControlPressed {
        chat: ChatId,
        user: UserId,
        message: MessageId,
        token: String,
    },
}
