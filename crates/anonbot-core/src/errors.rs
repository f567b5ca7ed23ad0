/// Core error type for the relay bot.
///
/// The adapter crate maps its transport-specific errors into this type so the
/// relay core can handle failures consistently (fatal at startup vs logged
/// and dropped per update).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
