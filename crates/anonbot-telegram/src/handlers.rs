//! Telegram update handlers.
//!
//! Each incoming message is converted into the core incoming-update model
//! and handed to the relay. Updates with no text payload are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use anonbot_core::{
    domain::{ChatId, UserId},
    messaging::types::{IncomingUpdate, StartCommand, TextMessage},
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.is_empty() {
        return Ok(());
    }

    let chat_id = ChatId(msg.chat.id.0);
    let user_id = UserId(user.id.0 as i64);

    // Only /start is recognized; any other text, slash-prefixed or not,
    // goes through the relay path as-is.
    let update = match parse_command(text) {
        Some((cmd, args)) if cmd == "start" => IncomingUpdate::Start(StartCommand {
            chat_id,
            user_id,
            args,
        }),
        _ => IncomingUpdate::Text(TextMessage {
            chat_id,
            user_id,
            text: text.to_string(),
        }),
    };

    state.relay.handle_update(update).await;
    Ok(())
}

fn parse_command(text: &str) -> Option<(String, String)> {
    // Telegram may send `/cmd@botname arg1 ...`
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_token() {
        assert_eq!(
            parse_command("/start abc123"),
            Some(("start".to_string(), "abc123".to_string()))
        );
    }

    #[test]
    fn parses_bare_start() {
        assert_eq!(
            parse_command("/start"),
            Some(("start".to_string(), String::new()))
        );
    }

    #[test]
    fn strips_bot_mention_and_lowercases() {
        assert_eq!(
            parse_command("/Start@anonbot tok"),
            Some(("start".to_string(), "tok".to_string()))
        );
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello"), None);
    }

    // Parses as a command, but fails the start guard in handle_message and
    // relays as ordinary text.
    #[test]
    fn unrecognized_command_parses_but_is_not_start() {
        assert_eq!(
            parse_command("/help"),
            Some(("help".to_string(), String::new()))
        );
        assert_ne!(parse_command("/help").unwrap().0, "start");
    }
}
