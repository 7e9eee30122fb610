//! Read side of the stat store
//!
//! Lookups and listings for the management API, plus the session counts
//! and per-session history the chart pipeline consumes.

use rusqlite::{params, OptionalExtension};

use super::db::Db;
use super::models::{
    DashboardState, GameDetails, GameRef, InstallmentRef, PlayerRef, SessionPoint,
};
use crate::error::ApiError;

/// Query interface over the store
#[derive(Clone)]
pub struct Queries {
    db: Db,
}

impl Queries {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Players owned by a user, ordered by name
    pub fn players_for_user(&self, user_id: i64) -> Result<Vec<PlayerRef>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT player_id, player_name FROM dim_players
             WHERE user_id = ?1 ORDER BY player_name",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(PlayerRef {
                player_id: row.get(0)?,
                player_name: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Games the user has stats for
    pub fn games_for_user(&self, user_id: i64) -> Result<Vec<GameRef>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT g.game_id, g.game_name
             FROM dim_games g
             JOIN fact_game_stats gs ON g.game_id = gs.game_id
             JOIN dim_players p ON gs.player_id = p.player_id
             WHERE p.user_id = ?1
             ORDER BY g.game_name",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(GameRef {
                game_id: row.get(0)?,
                game_name: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn game_details(&self, game_id: i64) -> Result<Option<GameDetails>, ApiError> {
        let conn = self.db.acquire()?;
        let row = conn
            .query_row(
                "SELECT game_name, game_installment, game_genre, game_subgenre
                 FROM dim_games WHERE game_id = ?1",
                [game_id],
                |r| {
                    Ok(GameDetails {
                        game_name: r.get(0)?,
                        game_installment: r.get(1)?,
                        game_genre: r.get(2)?,
                        game_subgenre: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Does the user have any stats for this game? (implies ownership)
    pub fn user_has_game_stats(&self, game_id: i64, user_id: i64) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM fact_game_stats gs
                 JOIN dim_players p ON gs.player_id = p.player_id
                 WHERE gs.game_id = ?1 AND p.user_id = ?2
                 LIMIT 1",
                params![game_id, user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// Does any stat at all reference this game?
    pub fn game_has_stats(&self, game_id: i64) -> Result<bool, ApiError> {
        let conn = self.db.acquire()?;
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM fact_game_stats WHERE game_id = ?1 LIMIT 1",
                [game_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// Unique game modes for a game, scoped to the user
    pub fn game_modes(&self, game_id: i64, user_id: i64) -> Result<Vec<String>, ApiError> {
        self.distinct_strings(
            "SELECT DISTINCT gs.game_mode
             FROM fact_game_stats gs
             JOIN dim_players p ON gs.player_id = p.player_id
             WHERE gs.game_id = ?1 AND p.user_id = ?2
               AND gs.game_mode IS NOT NULL AND gs.game_mode != ''
             ORDER BY gs.game_mode",
            game_id,
            user_id,
        )
    }

    /// Unique stat types for a game, scoped to the user
    pub fn stat_types_for_user(&self, game_id: i64, user_id: i64) -> Result<Vec<String>, ApiError> {
        self.distinct_strings(
            "SELECT DISTINCT gs.stat_type
             FROM fact_game_stats gs
             JOIN dim_players p ON gs.player_id = p.player_id
             WHERE gs.game_id = ?1 AND p.user_id = ?2
               AND gs.stat_type IS NOT NULL AND gs.stat_type != ''
             ORDER BY gs.stat_type",
            game_id,
            user_id,
        )
    }

    /// Unique rank values (pre- and post-match) from ranked sessions
    pub fn game_ranks(&self, game_id: i64, user_id: i64) -> Result<Vec<String>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT rank_value FROM (
                 SELECT gs.pre_match_rank_value AS rank_value
                 FROM fact_game_stats gs
                 JOIN dim_players p ON gs.player_id = p.player_id
                 WHERE gs.game_id = ?1 AND gs.ranked = 1
                   AND gs.pre_match_rank_value IS NOT NULL AND p.user_id = ?2
                 UNION
                 SELECT gs.post_match_rank_value AS rank_value
                 FROM fact_game_stats gs
                 JOIN dim_players p ON gs.player_id = p.player_id
                 WHERE gs.game_id = ?1 AND gs.ranked = 1
                   AND gs.post_match_rank_value IS NOT NULL AND p.user_id = ?2
             )
             WHERE rank_value IS NOT NULL AND rank_value != ''
             ORDER BY rank_value",
        )?;
        let rows = stmt.query_map(params![game_id, user_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Unique franchise names the user has stats for
    pub fn franchises_for_user(&self, user_id: i64) -> Result<Vec<String>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT g.game_name
             FROM dim_games g
             JOIN fact_game_stats gs ON g.game_id = gs.game_id
             JOIN dim_players p ON gs.player_id = p.player_id
             WHERE p.user_id = ?1 AND g.game_name IS NOT NULL
             ORDER BY g.game_name",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Installments of a franchise the user has stats for.
    /// NULL installments are labeled "(Main Game)".
    pub fn installments_for_user(
        &self,
        user_id: i64,
        franchise: &str,
    ) -> Result<Vec<InstallmentRef>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT g.game_id, g.game_installment
             FROM dim_games g
             JOIN fact_game_stats gs ON g.game_id = gs.game_id
             JOIN dim_players p ON gs.player_id = p.player_id
             WHERE p.user_id = ?1 AND g.game_name = ?2
             ORDER BY g.game_installment",
        )?;
        let rows = stmt.query_map(params![user_id, franchise], |row| {
            let installment: Option<String> = row.get(1)?;
            Ok(InstallmentRef {
                game_id: row.get(0)?,
                installment_name: installment.unwrap_or_else(|| "(Main Game)".to_string()),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Distinct played_at instants = play sessions for the pair
    pub fn sessions_played(&self, player_id: i64, game_id: i64) -> Result<i64, ApiError> {
        let conn = self.db.acquire()?;
        let count = conn.query_row(
            "SELECT COUNT(DISTINCT played_at) FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2",
            params![player_id, game_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    pub fn player_name(&self, player_id: i64) -> Result<Option<String>, ApiError> {
        let conn = self.db.acquire()?;
        let row = conn
            .query_row(
                "SELECT player_name FROM dim_players WHERE player_id = ?1",
                [player_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(row)
    }

    /// (game_name, game_installment) for a game id
    pub fn game_identity(
        &self,
        game_id: i64,
    ) -> Result<Option<(String, Option<String>)>, ApiError> {
        let conn = self.db.acquire()?;
        let row = conn
            .query_row(
                "SELECT game_name, game_installment FROM dim_games WHERE game_id = ?1",
                [game_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// The live selection row
    pub fn dashboard_state(&self) -> Result<DashboardState, ApiError> {
        let conn = self.db.acquire()?;
        let state = conn
            .query_row(
                "SELECT current_player_id, current_game_id
                 FROM dim_dashboard_state WHERE state_id = 1",
                [],
                |r| {
                    Ok(DashboardState {
                        current_player_id: r.get(0)?,
                        current_game_id: r.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    /// Stat types for a game ranked by ascending non-zero average.
    ///
    /// Smaller-average stats are treated as the more interesting
    /// per-session counters; the floor at value > 0 keeps dormant
    /// counters out. Game-wide, not player-scoped.
    pub fn top_stat_types(&self, game_id: i64, limit: usize) -> Result<Vec<String>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT stat_type, AVG(stat_value) AS avg_value
             FROM fact_game_stats
             WHERE game_id = ?1
               AND stat_type IS NOT NULL AND stat_type != ''
               AND stat_value > 0
             GROUP BY stat_type
             HAVING AVG(stat_value) > 0
             ORDER BY avg_value ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![game_id, limit as i64], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Most recent recorded value for one stat type
    pub fn latest_stat_value(
        &self,
        player_id: i64,
        game_id: i64,
        stat_type: &str,
    ) -> Result<Option<i64>, ApiError> {
        let conn = self.db.acquire()?;
        let row = conn
            .query_row(
                "SELECT stat_value FROM fact_game_stats
                 WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
                 ORDER BY played_at DESC LIMIT 1",
                params![player_id, game_id, stat_type],
                |r| r.get(0),
            )
            .optional()?;
        Ok(row)
    }

    /// Per-session values for one stat type, oldest first (line charts)
    pub fn stat_history(
        &self,
        player_id: i64,
        game_id: i64,
        stat_type: &str,
    ) -> Result<Vec<SessionPoint>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT played_at, CAST(AVG(stat_value) AS INTEGER)
             FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
             GROUP BY played_at
             ORDER BY played_at ASC",
        )?;
        let rows = stmt.query_map(params![player_id, game_id, stat_type], |row| {
            Ok(SessionPoint {
                played_at: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn distinct_strings(
        &self,
        sql: &str,
        game_id: i64,
        user_id: i64,
    ) -> Result<Vec<String>, ApiError> {
        let conn = self.db.acquire()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![game_id, user_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
