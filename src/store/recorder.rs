//! Write side of the stat store
//!
//! Handles user/game/player upserts, stat-batch ingestion, the dashboard
//! selection row, and deletes. Multi-statement operations run inside a
//! transaction; an early return rolls it back.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::db::Db;
use super::models::{GameIdentity, NewStat, StatDeletion};
use crate::error::ApiError;

/// Records writes to the database
#[derive(Clone)]
pub struct Recorder {
    db: Db,
}

impl Recorder {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Look up a user by email. Returns (user_id, is_trusted).
    pub fn find_user(&self, email: &str) -> Result<Option<(i64, bool)>, ApiError> {
        let conn = self.db.acquire()?;
        let row = conn
            .query_row(
                "SELECT user_id, is_trusted FROM dim_users WHERE user_email = ?1",
                [email],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)? != 0)),
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a user if missing; returns (user_id, is_trusted) either way.
    pub fn ensure_user(&self, email: &str, trusted: bool) -> Result<(i64, bool), ApiError> {
        if let Some(existing) = self.find_user(email)? {
            return Ok(existing);
        }

        let conn = self.db.acquire()?;
        conn.execute(
            "INSERT INTO dim_users (user_email, is_trusted) VALUES (?1, ?2)",
            params![email, trusted as i64],
        )?;
        info!("Registered user {email} (trusted: {trusted})");
        Ok((conn.last_insert_rowid(), trusted))
    }

    /// Update the trust flag for an existing user. Returns false if absent.
    pub fn set_trusted(&self, email: &str, trusted: bool) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let rows = conn.execute(
            "UPDATE dim_users SET is_trusted = ?1 WHERE user_email = ?2",
            params![trusted as i64, email],
        )?;
        Ok(rows > 0)
    }

    /// Insert-or-update a user with an explicit trust flag (admin path).
    pub fn upsert_trusted(&self, email: &str, trusted: bool) -> Result<(), ApiError> {
        let conn = self.db.acquire()?;
        conn.execute(
            "INSERT INTO dim_users (user_email, is_trusted) VALUES (?1, ?2)
             ON CONFLICT(user_email) DO UPDATE SET is_trusted = ?2",
            params![email, trusted as i64],
        )?;
        info!("Admin set trust for {email} to {trusted}");
        Ok(())
    }

    /// Find-or-create a game by (name, installment), bumping last_played_at.
    pub fn ensure_game(&self, game: &GameIdentity, now_ms: i64) -> Result<i64, ApiError> {
        let conn = self.db.acquire()?;
        let existing = find_game_id(&conn, &game.game_name, game.game_installment.as_deref())?;

        if let Some(game_id) = existing {
            conn.execute(
                "UPDATE dim_games SET last_played_at = ?1 WHERE game_id = ?2",
                params![now_ms, game_id],
            )?;
            return Ok(game_id);
        }

        info!(
            "Game '{}' (installment: {:?}) not found, creating",
            game.game_name, game.game_installment
        );
        conn.execute(
            "INSERT INTO dim_games
               (game_name, game_installment, game_genre, game_subgenre, created_at, last_played_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                game.game_name,
                game.game_installment,
                game.game_genre,
                game.game_subgenre,
                now_ms,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find-or-create a player owned by a user.
    pub fn ensure_player(&self, name: &str, user_id: i64, now_ms: i64) -> Result<i64, ApiError> {
        let conn = self.db.acquire()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT player_id FROM dim_players WHERE player_name = ?1 AND user_id = ?2",
                params![name, user_id],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(player_id) = existing {
            return Ok(player_id);
        }

        info!("Player '{name}' for user {user_id} not found, creating");
        conn.execute(
            "INSERT INTO dim_players (player_name, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, user_id, now_ms],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of stats as one play session (shared played_at).
    /// Entries missing a type or value are skipped. Returns the number
    /// of rows written.
    pub fn insert_stats(
        &self,
        player_id: i64,
        game_id: i64,
        stats: &[NewStat],
        played_at_ms: i64,
    ) -> Result<usize, ApiError> {
        let mut conn = self.db.acquire()?;
        let tx = conn.transaction()?;

        let mut inserted = 0;
        for stat in stats {
            if !stat.is_valid() {
                continue;
            }
            tx.execute(
                "INSERT INTO fact_game_stats
                   (game_id, player_id, stat_type, stat_value, game_mode, game_level,
                    win, ranked, pre_match_rank_value, post_match_rank_value, played_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    game_id,
                    player_id,
                    stat.stat_type,
                    stat.stat_value,
                    stat.game_mode,
                    stat.game_level,
                    stat.win,
                    stat.ranked,
                    stat.pre_match_rank_value,
                    stat.post_match_rank_value,
                    played_at_ms,
                ],
            )?;
            inserted += 1;
        }

        tx.commit()?;
        if inserted > 0 {
            info!("Inserted {inserted} stats for player {player_id} / game {game_id}");
        }
        Ok(inserted)
    }

    /// Overwrite the live selection. Last write wins.
    pub fn set_live_state(
        &self,
        player_id: i64,
        game_id: i64,
        now_ms: i64,
    ) -> Result<(), ApiError> {
        let conn = self.db.acquire()?;
        conn.execute(
            "UPDATE dim_dashboard_state
             SET current_player_id = ?1, current_game_id = ?2, updated_at = ?3
             WHERE state_id = 1",
            params![player_id, game_id, now_ms],
        )?;
        Ok(())
    }

    /// Rename a player. The caller must own it. Returns false if not found.
    pub fn update_player(
        &self,
        player_id: i64,
        user_id: i64,
        new_name: &str,
    ) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let rows = conn.execute(
            "UPDATE dim_players SET player_name = ?1 WHERE player_id = ?2 AND user_id = ?3",
            params![new_name, player_id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Delete a player and every stat row referencing it.
    /// Returns false if the player does not exist or belongs to someone else.
    pub fn delete_player(&self, player_id: i64, user_id: i64) -> Result<bool, ApiError> {
        let mut conn = self.db.acquire()?;
        let tx = conn.transaction()?;

        let owned: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM dim_players WHERE player_id = ?1 AND user_id = ?2",
                params![player_id, user_id],
                |r| r.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Ok(false);
        }

        let stats = tx.execute(
            "DELETE FROM fact_game_stats WHERE player_id = ?1",
            [player_id],
        )?;
        tx.execute(
            "DELETE FROM dim_players WHERE player_id = ?1 AND user_id = ?2",
            params![player_id, user_id],
        )?;
        tx.commit()?;

        info!("Deleted player {player_id} and {stats} stats");
        Ok(true)
    }

    /// Update a game's details. Duplicate (name, installment) pairs
    /// surface as a conflict.
    pub fn update_game(&self, game_id: i64, game: &GameIdentity) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let result = conn.execute(
            "UPDATE dim_games
             SET game_name = ?1, game_installment = ?2, game_genre = ?3, game_subgenre = ?4
             WHERE game_id = ?5",
            params![
                game.game_name,
                game.game_installment,
                game.game_genre,
                game.game_subgenre,
                game_id,
            ],
        );

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_unique_violation(&e) => Err(ApiError::Conflict(format!(
                "Game name '{}' already exists",
                game.game_name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a game row. The caller must have verified no stats remain.
    pub fn delete_game(&self, game_id: i64) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let rows = conn.execute("DELETE FROM dim_games WHERE game_id = ?1", [game_id])?;
        Ok(rows > 0)
    }

    /// Delete a single stat row owned (via its player) by the user.
    ///
    /// Returns None when the row is missing or not owned. Otherwise
    /// reports whether the game just lost its final stat row entirely.
    pub fn delete_stat(&self, stat_id: i64, user_id: i64) -> Result<Option<StatDeletion>, ApiError> {
        let mut conn = self.db.acquire()?;
        let tx = conn.transaction()?;

        let game_id: Option<i64> = tx
            .query_row(
                "SELECT gs.game_id
                 FROM fact_game_stats gs
                 JOIN dim_players p ON gs.player_id = p.player_id
                 WHERE gs.stat_id = ?1 AND p.user_id = ?2",
                params![stat_id, user_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(game_id) = game_id else {
            return Ok(None);
        };

        tx.execute("DELETE FROM fact_game_stats WHERE stat_id = ?1", [stat_id])?;

        let user_stats_remain: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM fact_game_stats gs
                 JOIN dim_players p ON gs.player_id = p.player_id
                 WHERE gs.game_id = ?1 AND p.user_id = ?2
                 LIMIT 1",
                params![game_id, user_id],
                |r| r.get(0),
            )
            .optional()?;

        let mut last_stat_deleted = false;
        if user_stats_remain.is_none() {
            let any_remain: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM fact_game_stats WHERE game_id = ?1 LIMIT 1",
                    [game_id],
                    |r| r.get(0),
                )
                .optional()?;
            last_stat_deleted = any_remain.is_none();
        }

        tx.commit()?;
        info!("Deleted stat {stat_id} (game {game_id})");
        Ok(Some(StatDeletion {
            game_id,
            last_stat_deleted,
        }))
    }
}

fn find_game_id(
    conn: &Connection,
    name: &str,
    installment: Option<&str>,
) -> Result<Option<i64>, ApiError> {
    let row = match installment {
        Some(inst) => conn
            .query_row(
                "SELECT game_id FROM dim_games WHERE game_name = ?1 AND game_installment = ?2",
                params![name, inst],
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT game_id FROM dim_games WHERE game_name = ?1 AND game_installment IS NULL",
                [name],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(row)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
