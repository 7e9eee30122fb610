//! SQLite database connection pool and schema management
//!
//! Opens the `~/.statline/stats.db` database with a small fixed pool of
//! connections. WAL mode lets the pool's connections read and write
//! concurrently; callers beyond the pool size queue on the slot mutexes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config::Config;
use crate::error::ApiError;

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Database wrapper with a fixed-size connection pool
#[derive(Clone)]
pub struct Db {
    slots: Arc<Vec<Mutex<Connection>>>,
    next: Arc<AtomicUsize>,
}

impl Db {
    /// Open or create the database at the default location (~/.statline/stats.db)
    pub fn open_default() -> Result<Self> {
        let db_path = Config::global_data_dir().join("stats.db");
        Self::open(&db_path)
    }

    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_pool(path, DEFAULT_POOL_SIZE)
    }

    /// Open or create the database with an explicit pool size
    pub fn open_with_pool(path: &Path, pool_size: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }

        let pool_size = pool_size.max(1);
        let mut slots = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open(path)
                .with_context(|| format!("Failed to open stats db: {}", path.display()))?;

            // WAL mode for concurrent access across pool slots
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;

            slots.push(Mutex::new(conn));
        }

        let db = Self {
            slots: Arc::new(slots),
            next: Arc::new(AtomicUsize::new(0)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Acquire a pooled connection.
    ///
    /// Tries every slot without blocking first, then queues on one.
    /// A poisoned slot is a pool failure, surfaced as-is — never retried.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let n = self.slots.len();

        for i in 0..n {
            match self.slots[(start + i) % n].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(ApiError::Pool),
            }
        }

        self.slots[start % n].lock().map_err(|_| ApiError::Pool)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.acquire()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }
}

/// SQL schema: dimension tables, the singleton dashboard-state row, and
/// the per-session fact table.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dim_users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_email TEXT NOT NULL UNIQUE,
    is_trusted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS dim_games (
    game_id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_name TEXT NOT NULL,
    game_installment TEXT,
    game_genre TEXT,
    game_subgenre TEXT,
    created_at INTEGER NOT NULL,
    last_played_at INTEGER NOT NULL,
    UNIQUE(game_name, game_installment)
);

CREATE TABLE IF NOT EXISTS dim_players (
    player_id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_name TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES dim_users(user_id),
    created_at INTEGER NOT NULL,
    UNIQUE(player_name, user_id)
);

-- Singleton row: the player/game pair the overlay is currently showing.
-- Concurrent writers race with last-write-wins semantics.
CREATE TABLE IF NOT EXISTS dim_dashboard_state (
    state_id INTEGER PRIMARY KEY CHECK (state_id = 1),
    current_player_id INTEGER,
    current_game_id INTEGER,
    updated_at INTEGER
);
INSERT OR IGNORE INTO dim_dashboard_state (state_id) VALUES (1);

-- One row per stat per play session. Rows sharing a played_at instant
-- belong to the same session. played_at is UTC epoch milliseconds;
-- conversion to the caller timezone happens at query time.
CREATE TABLE IF NOT EXISTS fact_game_stats (
    stat_id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES dim_games(game_id),
    player_id INTEGER NOT NULL REFERENCES dim_players(player_id),
    stat_type TEXT NOT NULL,
    stat_value INTEGER,
    game_mode TEXT,
    game_level INTEGER,
    win INTEGER,
    ranked INTEGER,
    pre_match_rank_value TEXT,
    post_match_rank_value TEXT,
    played_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stats_game ON fact_game_stats(game_id);
CREATE INDEX IF NOT EXISTS idx_stats_player_game ON fact_game_stats(player_id, game_id);
CREATE INDEX IF NOT EXISTS idx_stats_played ON fact_game_stats(player_id, game_id, played_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_stats.db");
        let db = Db::open(&db_path).unwrap();

        let conn = db.acquire().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"dim_users".to_string()));
        assert!(tables.contains(&"dim_games".to_string()));
        assert!(tables.contains(&"dim_players".to_string()));
        assert!(tables.contains(&"fact_game_stats".to_string()));
    }

    #[test]
    fn test_state_row_seeded_once() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_stats.db");

        // Open twice: schema init must be idempotent
        drop(Db::open(&db_path).unwrap());
        let db = Db::open(&db_path).unwrap();

        let conn = db.acquire().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM dim_dashboard_state", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let (player, game): (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT current_player_id, current_game_id FROM dim_dashboard_state WHERE state_id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(player, None);
        assert_eq!(game, None);
    }

    #[test]
    fn test_pool_serves_concurrent_callers() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_stats.db");
        let db = Db::open_with_pool(&db_path, 2).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(std::thread::spawn(move || {
                let conn = db.acquire().unwrap();
                let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
                assert_eq!(one, 1);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
