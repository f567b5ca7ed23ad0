use crate::domain::{ChatId, UserId};

/// Cross-messenger incoming update model.
///
/// Transport-specific fields live in the adapter. The command surface is a
/// single command (`/start`), so the relay core only ever sees a start
/// command or free text; the adapter routes everything else (including
/// unrecognized slash commands) through the text path.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Start(StartCommand),
    Text(TextMessage),
}

/// `/start` with an optional token argument. Telegram delivers a deep-link
/// open (`t.me/<bot>?start=<token>`) as `/start <token>`.
#[derive(Clone, Debug)]
pub struct StartCommand {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub args: String,
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}
