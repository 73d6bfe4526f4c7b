//! Conversation history persistence.
//!
//! The store is a shared, externally-synchronized key-value resource: turns
//! are read and appended best-effort, with no transaction tying a request's
//! two appends together. Two simultaneous requests on the same conversation
//! may interleave their appends — a documented race, not fixed here.

pub mod sqlite;

pub use sqlite::Database;

use crate::models::Turn;
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered turn storage keyed by conversation id
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Read all turns for a conversation, oldest first. Unknown
    /// conversations yield an empty sequence, not an error.
    async fn read(&self, conversation_id: &str) -> Result<Vec<Turn>, String>;

    /// Append one turn. Best-effort: callers log failures and move on.
    async fn append(&self, conversation_id: &str, turn: Turn) -> Result<(), String>;
}

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    db: Arc<Database>,
}

impl SqliteHistoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn read(&self, conversation_id: &str) -> Result<Vec<Turn>, String> {
        self.db
            .get_turns(conversation_id)
            .map_err(|e| format!("History read error: {}", e))
    }

    async fn append(&self, conversation_id: &str, turn: Turn) -> Result<(), String> {
        self.db
            .append_turn(conversation_id, &turn)
            .map_err(|e| format!("History append error: {}", e))
    }
}
