use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Cross-messenger port.
///
/// Telegram is the first implementation; the shape is kept minimal so future
/// adapters can fit behind the same interface. The relay only ever sends
/// plain text.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
