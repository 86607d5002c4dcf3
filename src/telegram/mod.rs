// Telegram surface - routing glue around the Messenger boundary

mod api;
mod types;

pub use api::TelegramApi;
pub use types::Update;
