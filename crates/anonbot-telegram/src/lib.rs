//! Telegram adapter (teloxide).
//!
//! This crate implements the `anonbot-core` MessagingPort over the Telegram
//! Bot API. Sends are attempted once; a failure surfaces as a core error and
//! the update that triggered it is dropped by the relay.

use async_trait::async_trait;

use teloxide::prelude::*;

pub mod handlers;
pub mod router;

use anonbot_core::{domain::ChatId, errors::Error, messaging::port::MessagingPort, Result};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(Self::tg_chat(chat_id), text.to_string())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
