//! SQLite database handle and turn table operations.

use crate::models::{Turn, TurnRole};
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long to wait for a pooled connection before reporting an error.
/// History is best-effort, so a contended pool degrades the request
/// rather than stalling it for r2d2's 30 s default.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists.
    /// `:memory:` is supported for tests.
    pub fn new(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (manager, max_size) = if path == ":memory:" {
            // Each in-memory connection is its own database, so the pool
            // must stay at a single connection.
            (SqliteConnectionManager::memory(), 1)
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            (SqliteConnectionManager::file(path), 8)
        };

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a pooled connection. An exhausted or timed-out pool is an error
    /// for the caller to absorb; this runs on the request path, so it must
    /// never panic.
    pub fn conn(&self) -> Result<DbConn, String> {
        self.pool
            .get()
            .map_err(|e| format!("Connection pool error: {}", e))
    }

    fn init_schema(&self) -> Result<(), String> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| e.to_string())?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_turns_conversation
             ON turns (conversation_id, id)",
            [],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// All turns for a conversation, oldest first
    pub fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>, String> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT role, content FROM turns WHERE conversation_id = ?1 ORDER BY id")
            .map_err(|e| e.to_string())?;

        let turns = stmt
            .query_map([conversation_id], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((role, content))
            })
            .map_err(|e| e.to_string())?
            .filter_map(|r| r.ok())
            .filter_map(|(role, content)| {
                TurnRole::from_str(&role).map(|role| Turn { role, content })
            })
            .collect();

        Ok(turns)
    }

    /// Append one turn to a conversation
    pub fn append_turn(&self, conversation_id: &str, turn: &Turn) -> Result<(), String> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO turns (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![conversation_id, turn.role.as_str(), &turn.content, &now],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Number of turns stored for a conversation
    #[cfg(test)]
    pub fn count_turns(&self, conversation_id: &str) -> Result<i64, String> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE conversation_id = ?1",
            [conversation_id],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryStore, SqliteHistoryStore};
    use std::sync::Arc;

    #[test]
    fn test_append_and_read_ordering() {
        let db = Database::new(":memory:").expect("in-memory db");

        db.append_turn("conv-1", &Turn::user("first")).unwrap();
        db.append_turn("conv-1", &Turn::assistant("second")).unwrap();
        db.append_turn("conv-2", &Turn::user("other")).unwrap();

        let turns = db.get_turns("conv-1").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].content, "second");

        assert_eq!(db.count_turns("conv-2").unwrap(), 1);
    }

    #[test]
    fn test_unknown_conversation_reads_empty() {
        let db = Database::new(":memory:").expect("in-memory db");
        assert!(db.get_turns("never-seen").unwrap().is_empty());
    }

    #[test]
    fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let db = Database::new(path.to_str().unwrap()).expect("on-disk db");

        db.append_turn("c", &Turn::user("hello")).unwrap();
        assert_eq!(db.count_turns("c").unwrap(), 1);
    }

    #[test]
    fn test_exhausted_pool_is_an_error_not_a_panic() {
        let db = Database::new(":memory:").expect("in-memory db");

        // The in-memory pool holds exactly one connection; keeping it
        // checked out starves every other caller.
        let _held = db.conn().unwrap();

        let err = db.append_turn("c", &Turn::user("hi")).unwrap_err();
        assert!(err.contains("Connection pool error"));
    }

    #[tokio::test]
    async fn test_store_trait_round_trip() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let store = SqliteHistoryStore::new(db);

        store.append("c", Turn::user("hi")).await.unwrap();
        store.append("c", Turn::assistant("hello")).await.unwrap();

        let turns = store.read("c").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "hello");
    }
}
