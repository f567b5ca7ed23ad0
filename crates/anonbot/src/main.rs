use std::sync::Arc;

use anonbot_core::{config::Config, store::Store};

#[tokio::main]
async fn main() -> Result<(), anonbot_core::Error> {
    anonbot_core::logging::init("anonbot")?;

    let cfg = Arc::new(Config::load()?);
    let store = Arc::new(Store::open(&cfg.database_path)?);

    anonbot_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| anonbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
