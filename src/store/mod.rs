//! Stat store: SQLite star schema for per-session game statistics
//!
//! Dimension tables hold users, games, and players; a single fact table
//! holds one row per stat per play session. A separate singleton row
//! tracks the player/game pair the live overlay is currently showing.
//!
//! # Usage
//!
//! ```ignore
//! let store = StatStore::with_path(&path)?;
//!
//! // Ingest a session
//! let game_id = store.recorder().ensure_game(&identity, now_ms)?;
//! store.recorder().insert_stats(player_id, game_id, &batch, now_ms)?;
//!
//! // Read for the overlay
//! let state = store.query().dashboard_state()?;
//! ```

mod db;
mod models;
mod recorder;
mod queries;

pub use db::{Db, DEFAULT_POOL_SIZE};
pub use models::{
    DashboardState, GameDetails, GameIdentity, GameRef, InstallmentRef, NewStat, PlayerRef,
    SessionPoint, StatDeletion,
};
pub use queries::Queries;
pub use recorder::Recorder;

use std::path::Path;

use anyhow::Result;

/// Central handle to the stat store
///
/// Coordinates the write and read sides over one connection pool.
#[derive(Clone)]
pub struct StatStore {
    db: Db,
}

impl StatStore {
    /// Open the store at the default location (~/.statline/stats.db)
    pub fn new() -> Result<Self> {
        let db = Db::open_default()?;
        Ok(Self { db })
    }

    /// Open the store at a specific path
    pub fn with_path(path: &Path) -> Result<Self> {
        let db = Db::open(path)?;
        Ok(Self { db })
    }

    /// Open the store with an explicit pool size
    pub fn with_pool(path: &Path, pool_size: usize) -> Result<Self> {
        let db = Db::open_with_pool(path, pool_size)?;
        Ok(Self { db })
    }

    /// Write-side handle
    pub fn recorder(&self) -> Recorder {
        Recorder::new(self.db.clone())
    }

    /// Read-side handle
    pub fn query(&self) -> Queries {
        Queries::new(self.db.clone())
    }

    /// Raw pooled database handle (dashboard engine queries)
    pub fn db(&self) -> Db {
        self.db.clone()
    }
}
