use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, params};

use crate::api::models::Conversation;
use crate::error::ChatError;
use crate::models::Message;

/// Durable side of the engine. Holds the local-origin message mirror (one
/// opaque JSON blob per conversation) and a display cache of the chat list.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Vec<Message>>, ChatError>;

    async fn put_conversation_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), ChatError>;

    async fn upsert_conversations(&self, conversations: &[Conversation]) -> Result<(), ChatError>;

    async fn get_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>, ChatError>;
}

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
CREATE TABLE IF NOT EXISTS conversation_messages (
    conversation_id TEXT PRIMARY KEY,
    messages_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "ChatSync")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the store at the platform data dir.
    pub fn open_default() -> Result<Self, ChatError> {
        let path = default_db_path()
            .ok_or_else(|| ChatError::StorageUnavailable("no data dir".to_string()))?;
        Self::open(path)
    }

    /// Open (or create) the store at an explicit path.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let path = path.into();
        ensure_dir(&path).map_err(|e| ChatError::StorageUnavailable(e.to_string()))?;
        let conn =
            Connection::open(&path).map_err(|e| ChatError::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| ChatError::StorageUnavailable(e.to_string()))?;
        Ok(Self { path })
    }

    /// Run sqlite work off the async thread. A fresh connection per call
    /// keeps the store free of connection state; WAL makes that cheap.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(path)?;
            f(conn)
        })
        .await
        .map_err(|e| ChatError::StorageUnavailable(e.to_string()))?
        .map_err(|e| ChatError::StorageUnavailable(e.to_string()))
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Vec<Message>>, ChatError> {
        let id = conversation_id.to_string();
        let blob: Option<String> = self
            .blocking(move |conn| {
                conn.prepare(
                    "SELECT messages_json FROM conversation_messages WHERE conversation_id = ?1",
                )?
                .query_row(params![id], |row| row.get(0))
                .optional()
            })
            .await?;
        match blob {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| ChatError::StorageUnavailable(e.to_string())),
        }
    }

    async fn put_conversation_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), ChatError> {
        let id = conversation_id.to_string();
        let json = serde_json::to_string(messages)
            .map_err(|e| ChatError::StorageUnavailable(e.to_string()))?;
        let now = Utc::now().timestamp();
        self.blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO conversation_messages (conversation_id, messages_json, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(conversation_id) DO UPDATE SET
                    messages_json=excluded.messages_json,
                    updated_at=excluded.updated_at
                "#,
                params![id, json, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_conversations(&self, conversations: &[Conversation]) -> Result<(), ChatError> {
        let rows: Vec<Conversation> = conversations.to_vec();
        let now = Utc::now().timestamp();
        self.blocking(move |mut conn| {
            let tx = conn.transaction()?;
            for c in &rows {
                tx.execute(
                    r#"
                    INSERT INTO conversations (id, name, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name,
                        updated_at=excluded.updated_at
                    "#,
                    params![c.id, c.name, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>, ChatError> {
        let lim = limit.unwrap_or(500) as i64;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name FROM conversations ORDER BY updated_at DESC, name ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![lim], |row| {
                Ok(Conversation { id: row.get(0)?, name: row.get(1)? })
            })?;
            rows.collect()
        })
        .await
    }
}
