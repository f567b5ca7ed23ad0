use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use anonbot_core::{
    config::Config, messaging::port::MessagingPort, relay::Relay, store::Store,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<Store>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Fetching our own handle doubles as the transport authorization check;
    // issued links are composed from it. Failure here is fatal.
    let me = bot.get_me().await?;
    let username = me.username().to_string();
    tracing::info!("anonbot started: @{username}");

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let relay = Arc::new(Relay::new(store, messenger, username));
    let state = Arc::new(AppState { relay });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
