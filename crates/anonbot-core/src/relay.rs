//! The relay itself: link issuance, session binding, and message dispatch.
//!
//! One synchronous pass per incoming update. Every fallible step is
//! attempted once; a failure is logged and the update dropped, then the
//! loop moves on to the next update.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::{ChatId, Token, UserId},
    messaging::{
        port::MessagingPort,
        types::{IncomingUpdate, StartCommand, TextMessage},
    },
    store::Store,
    Result,
};

const MSG_INVALID_LINK: &str = "Invalid link.";
const MSG_SEND_PROMPT: &str = "Отправь анонимное сообщение:";
const MSG_START_FIRST: &str = "Пожалуйста начни с валидной ссылкой /start <unique_id>";
const MSG_RELAY_PREFIX: &str = "Тебе пришло сообщение: ";

/// Outcome of binding an anonymous sender to a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    InvalidToken,
}

/// Outcome of resolving an anonymous sender's current owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedOwner {
    Owner(UserId),
    /// Sender never bound a session.
    NoSession,
    /// Session exists but its token no longer resolves to a user (the owner
    /// re-issued their link after the bind). Dropped silently.
    DeadToken,
}

/// Dependency-injected relay context: store + transport, plus the bot's own
/// handle for composing shareable links.
pub struct Relay {
    store: Arc<Store>,
    messenger: Arc<dyn MessagingPort>,
    bot_username: String,
}

impl Relay {
    pub fn new(store: Arc<Store>, messenger: Arc<dyn MessagingPort>, bot_username: String) -> Self {
        Self {
            store,
            messenger,
            bot_username,
        }
    }

    /// Generate a fresh token for the owner and return the shareable link.
    ///
    /// Re-issuing replaces the owner's previous token; any sessions bound to
    /// it are orphaned but left in place.
    pub async fn issue_link(&self, owner: UserId) -> Result<String> {
        let token = Token(Uuid::new_v4().to_string());
        self.store.upsert_user(owner, &token).await?;
        Ok(format!("t.me/{}?start={}", self.bot_username, token))
    }

    /// Bind an anonymous sender to an owner's token. The sole authorization
    /// check in the system: an unknown token is rejected without touching
    /// the sessions table.
    pub async fn bind_session(&self, anon: UserId, token: &Token) -> Result<BindOutcome> {
        if self.store.owner_by_token(token).await?.is_none() {
            return Ok(BindOutcome::InvalidToken);
        }
        self.store.upsert_session(anon, token).await?;
        Ok(BindOutcome::Bound)
    }

    /// Two-step lookup: sessions(anon) -> token, users(token) -> owner.
    pub async fn resolve_owner(&self, anon: UserId) -> Result<ResolvedOwner> {
        let Some(token) = self.store.session_token(anon).await? else {
            return Ok(ResolvedOwner::NoSession);
        };
        match self.store.owner_by_token(&token).await? {
            Some(owner) => Ok(ResolvedOwner::Owner(owner)),
            None => Ok(ResolvedOwner::DeadToken),
        }
    }

    /// Handle one incoming update. Never propagates: per-update failures are
    /// logged and the update is dropped.
    pub async fn handle_update(&self, update: IncomingUpdate) {
        if let Err(e) = self.dispatch(update).await {
            warn!("dropping update: {e}");
        }
    }

    async fn dispatch(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Start(cmd) => self.handle_start(cmd).await,
            IncomingUpdate::Text(msg) => self.handle_text(msg).await,
        }
    }

    async fn handle_start(&self, cmd: StartCommand) -> Result<()> {
        if cmd.args.is_empty() {
            let link = self.issue_link(cmd.user_id).await?;
            info!("issued link for owner {}", cmd.user_id.0);
            self.messenger
                .send_text(cmd.chat_id, &format!("Your unique link: {link}"))
                .await?;
            return Ok(());
        }

        let token = Token(cmd.args.clone());
        match self.bind_session(cmd.user_id, &token).await? {
            BindOutcome::InvalidToken => {
                self.messenger.send_text(cmd.chat_id, MSG_INVALID_LINK).await?;
            }
            BindOutcome::Bound => {
                info!("bound session for sender {}", cmd.user_id.0);
                self.messenger.send_text(cmd.chat_id, MSG_SEND_PROMPT).await?;
            }
        }
        Ok(())
    }

    async fn handle_text(&self, msg: TextMessage) -> Result<()> {
        if msg.text.is_empty() {
            return Ok(());
        }

        match self.resolve_owner(msg.user_id).await? {
            ResolvedOwner::NoSession => {
                self.messenger.send_text(msg.chat_id, MSG_START_FIRST).await?;
            }
            ResolvedOwner::DeadToken => {
                warn!(
                    "sender {} is bound to a token with no owner, dropping",
                    msg.user_id.0
                );
            }
            ResolvedOwner::Owner(owner) => {
                self.store.insert_message(msg.user_id, owner, &msg.text).await?;
                self.messenger
                    .send_text(ChatId(owner.0), &format!("{MSG_RELAY_PREFIX}{}", msg.text))
                    .await?;
                info!("relayed message to owner {}", owner.0);
            }
        }
        Ok(())
    }
}
