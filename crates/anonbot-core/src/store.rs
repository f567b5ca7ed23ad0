//! SQLite persistence: three relations (users, sessions, messages) owning
//! all durable state.
//!
//! A single connection guarded by an async mutex; every update is handled
//! one at a time, so per-statement atomicity is all the isolation required.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::{
    domain::{Token, UserId},
    Result,
};

/// One row from the messages table.
#[derive(Clone, Debug)]
pub struct MessageRow {
    pub id: i64,
    pub from_anon_id: i64,
    pub to_owner_id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS users (
    telegram_id INTEGER PRIMARY KEY,
    unique_id TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_anon_id INTEGER,
    to_owner_id INTEGER,
    text TEXT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    is_read BOOLEAN DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS sessions (
    anon_id INTEGER PRIMARY KEY,
    unique_id TEXT NOT NULL,
    FOREIGN KEY(unique_id) REFERENCES users(unique_id)
);";

/// Store over a local SQLite file. Schema is created idempotently on open.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // foreign_keys stays off: re-issuing a link replaces the owner's
        // unique_id and must leave sessions bound to the dead token in place
        // rather than fail the upsert. The pragma is explicit because the
        // bundled SQLite is compiled with SQLITE_DEFAULT_FOREIGN_KEYS=1.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace the (owner, token) pair. Re-issuing invalidates the
    /// owner's previous token; sessions bound to it are orphaned, not
    /// cleaned up.
    pub async fn upsert_user(&self, owner: UserId, token: &Token) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO users (telegram_id, unique_id) VALUES (?1, ?2)",
            params![owner.0, token.as_str()],
        )?;
        Ok(())
    }

    pub async fn owner_by_token(&self, token: &Token) -> Result<Option<UserId>> {
        let conn = self.conn.lock().await;
        let owner = conn
            .query_row(
                "SELECT telegram_id FROM users WHERE unique_id = ?1",
                params![token.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(owner.map(UserId))
    }

    /// Bind an anonymous sender to a token, replacing any prior binding for
    /// that sender unconditionally.
    pub async fn upsert_session(&self, anon: UserId, token: &Token) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (anon_id, unique_id) VALUES (?1, ?2)",
            params![anon.0, token.as_str()],
        )?;
        Ok(())
    }

    pub async fn session_token(&self, anon: UserId) -> Result<Option<Token>> {
        let conn = self.conn.lock().await;
        let token = conn
            .query_row(
                "SELECT unique_id FROM sessions WHERE anon_id = ?1",
                params![anon.0],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(token.map(Token))
    }

    /// Persist one relayed message. Timestamp and is_read take their SQL
    /// defaults (insertion time, false).
    pub async fn insert_message(&self, from: UserId, to: UserId, text: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (from_anon_id, to_owner_id, text) VALUES (?1, ?2, ?3)",
            params![from.0, to.0, text],
        )?;
        Ok(())
    }

    /// All messages relayed to an owner, oldest first.
    ///
    /// The relay itself is write-only on the messages relation; this is the
    /// store's read surface for it, currently exercised by tests and kept
    /// public for a future read-marking feature over `is_read`.
    pub async fn messages_to(&self, owner: UserId) -> Result<Vec<MessageRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, from_anon_id, to_owner_id, text, timestamp, is_read
             FROM messages WHERE to_owner_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![owner.0], |row| {
            let ts: NaiveDateTime = row.get(4)?;
            Ok(MessageRow {
                id: row.get(0)?,
                from_anon_id: row.get(1)?,
                to_owner_id: row.get(2)?,
                text: row.get(3)?,
                timestamp: ts.and_utc(),
                is_read: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Token {
        Token(s.to_string())
    }

    #[tokio::test]
    async fn reissuing_replaces_the_owners_token() {
        let store = Store::open_in_memory().unwrap();
        let owner = UserId(1);

        store.upsert_user(owner, &token("t1")).await.unwrap();
        store.upsert_user(owner, &token("t2")).await.unwrap();

        assert_eq!(store.owner_by_token(&token("t1")).await.unwrap(), None);
        assert_eq!(
            store.owner_by_token(&token("t2")).await.unwrap(),
            Some(owner)
        );
    }

    #[tokio::test]
    async fn reissuing_leaves_sessions_on_the_dead_token() {
        let store = Store::open_in_memory().unwrap();
        let owner = UserId(1);
        let anon = UserId(2);

        store.upsert_user(owner, &token("t1")).await.unwrap();
        store.upsert_session(anon, &token("t1")).await.unwrap();
        store.upsert_user(owner, &token("t2")).await.unwrap();

        // The session row persists but its token no longer resolves.
        assert_eq!(
            store.session_token(anon).await.unwrap(),
            Some(token("t1"))
        );
        assert_eq!(store.owner_by_token(&token("t1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_bind_replaces_the_prior_session() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_user(UserId(1), &token("t1")).await.unwrap();
        store.upsert_user(UserId(2), &token("t2")).await.unwrap();

        let anon = UserId(3);
        store.upsert_session(anon, &token("t1")).await.unwrap();
        store.upsert_session(anon, &token("t2")).await.unwrap();

        assert_eq!(
            store.session_token(anon).await.unwrap(),
            Some(token("t2"))
        );
    }

    #[tokio::test]
    async fn session_token_is_none_for_unknown_sender() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.session_token(UserId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn inserted_message_has_defaults_applied() {
        let store = Store::open_in_memory().unwrap();
        let from = UserId(2);
        let to = UserId(1);

        store.insert_message(from, to, "hello").await.unwrap();

        let rows = store.messages_to(to).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.from_anon_id, from.0);
        assert_eq!(row.to_owner_id, to.0);
        assert_eq!(row.text, "hello");
        assert!(!row.is_read);
        // CURRENT_TIMESTAMP default lands within the test run.
        assert!(row.timestamp <= Utc::now());
    }
}
