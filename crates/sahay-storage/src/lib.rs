//! sahay-storage: SQLite persistence for conversation threads and user memory.
//!
//! Thread state (summary + message tail) is stored as one row per
//! `(user_id, thread_id)`; saving a thread replaces the whole row, so a turn's
//! state update is atomic. Long-term memory facts are one row per
//! `(user_id, key)` with last-write-wins upsert.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use sahay_types::{MemoryFact, ThreadState};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// SQLite-backed store for thread state and user memory facts.
pub struct ThreadStore {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS threads (
        user_id TEXT NOT NULL,
        thread_id TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        messages TEXT NOT NULL DEFAULT '[]',
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, thread_id)
    );

    CREATE TABLE IF NOT EXISTS user_memory (
        user_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (user_id, key)
    );";

impl ThreadStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Thread store opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ─── Threads ───────────────────────────────────

    /// Load a thread's state. A thread that has never been saved loads as
    /// empty state, not an error.
    pub async fn load_thread(&self, user_id: &str, thread_id: &str) -> Result<ThreadState> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT summary, messages FROM threads WHERE user_id = ?1 AND thread_id = ?2",
                    rusqlite::params![user_id, thread_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((summary, messages)) => Ok(ThreadState {
                    summary,
                    messages: serde_json::from_str(&messages)?,
                }),
                None => Ok(ThreadState::default()),
            }
        })
        .await?
    }

    /// Replace a thread's state in a single row write.
    pub async fn save_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        state: &ThreadState,
    ) -> Result<()> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        let summary = state.summary.clone();
        let messages = serde_json::to_string(&state.messages)?;
        let now = chrono::Utc::now().timestamp_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO threads (user_id, thread_id, summary, messages, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user_id, thread_id, summary, messages, now],
            )?;
            Ok(())
        })
        .await?
    }

    /// List a user's thread ids, most recently active first.
    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT thread_id FROM threads WHERE user_id = ?1
                 ORDER BY updated_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await?
    }

    // ─── User Memory ───────────────────────────────────

    /// Upsert one memory fact (last write wins per `(user_id, key)`).
    pub async fn save_memory(&self, user_id: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO user_memory (user_id, key, value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, key)
                 DO UPDATE SET value = excluded.value",
                rusqlite::params![user_id, key, value],
            )?;
            Ok(())
        })
        .await?
    }

    /// Load every memory fact for a user, ordered by key.
    pub async fn load_all_memory(&self, user_id: &str) -> Result<Vec<MemoryFact>> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT user_id, key, value FROM user_memory WHERE user_id = ?1 ORDER BY key",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| {
                    Ok(MemoryFact {
                        user_id: row.get(0)?,
                        key: row.get(1)?,
                        value: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahay_types::Message;

    #[tokio::test]
    async fn test_load_missing_thread_is_empty() {
        let store = ThreadStore::open_in_memory().unwrap();
        let state = store.load_thread("u1", "t1").await.unwrap();
        assert!(state.summary.is_empty());
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn test_thread_round_trip() {
        let store = ThreadStore::open_in_memory().unwrap();
        let state = ThreadState {
            summary: "talked about crops".into(),
            messages: vec![
                Message::user("what is drip irrigation?"),
                Message::assistant("a low-volume watering method."),
            ],
        };
        store.save_thread("u1", "t1", &state).await.unwrap();

        let loaded = store.load_thread("u1", "t1").await.unwrap();
        assert_eq!(loaded.summary, "talked about crops");
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0], state.messages[0]);
    }

    #[tokio::test]
    async fn test_save_thread_replaces_state() {
        let store = ThreadStore::open_in_memory().unwrap();
        let first = ThreadState {
            summary: String::new(),
            messages: vec![Message::user("hello")],
        };
        store.save_thread("u1", "t1", &first).await.unwrap();

        let second = ThreadState {
            summary: "greeted".into(),
            messages: vec![Message::user("hello again")],
        };
        store.save_thread("u1", "t1", &second).await.unwrap();

        let loaded = store.load_thread("u1", "t1").await.unwrap();
        assert_eq!(loaded.summary, "greeted");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "hello again");
    }

    #[tokio::test]
    async fn test_list_threads_recent_first() {
        let store = ThreadStore::open_in_memory().unwrap();
        for id in ["t1", "t2", "t3"] {
            store
                .save_thread("u1", id, &ThreadState::default())
                .await
                .unwrap();
        }
        // t1 becomes the most recently touched thread
        store
            .save_thread("u1", "t1", &ThreadState::default())
            .await
            .unwrap();

        let threads = store.list_threads("u1").await.unwrap();
        assert_eq!(threads.len(), 3);
        assert_eq!(threads[0], "t1");

        assert!(store.list_threads("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_upsert_last_write_wins() {
        let store = ThreadStore::open_in_memory().unwrap();
        store.save_memory("u1", "name", "Alice").await.unwrap();
        store.save_memory("u1", "name", "Bob").await.unwrap();

        let facts = store.load_all_memory("u1").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "name");
        assert_eq!(facts[0].value, "Bob");
    }

    #[tokio::test]
    async fn test_memory_scoped_per_user() {
        let store = ThreadStore::open_in_memory().unwrap();
        store.save_memory("u1", "name", "Alice").await.unwrap();
        store.save_memory("u2", "location", "Pune").await.unwrap();

        let facts = store.load_all_memory("u1").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "name");
    }
}
