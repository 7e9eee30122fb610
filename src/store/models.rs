//! Data models for the stat store
//!
//! These structures represent rows written to and read from the database.

use serde::{Deserialize, Serialize};

/// One stat entry inside an ingestion batch.
///
/// `stat_type` is an open string key: whatever category the producer
/// sends becomes a first-class stat type. `win` is NULL for games that
/// do not track wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStat {
    pub stat_type: Option<String>,
    pub stat_value: Option<i64>,
    pub game_mode: Option<String>,
    pub game_level: Option<i64>,
    pub win: Option<i64>,
    pub ranked: Option<i64>,
    pub pre_match_rank_value: Option<String>,
    pub post_match_rank_value: Option<String>,
}

impl NewStat {
    /// Entries without a type or value are skipped at insert time.
    pub fn is_valid(&self) -> bool {
        self.stat_type.as_deref().is_some_and(|t| !t.is_empty()) && self.stat_value.is_some()
    }
}

/// Identity of a game: franchise name plus optional installment
#[derive(Debug, Clone, Default)]
pub struct GameIdentity {
    pub game_name: String,
    pub game_installment: Option<String>,
    pub game_genre: Option<String>,
    pub game_subgenre: Option<String>,
}

impl GameIdentity {
    /// "Name: Installment" or just "Name"
    pub fn full_name(&self) -> String {
        match self.game_installment.as_deref() {
            Some(inst) if !inst.is_empty() => format!("{}: {}", self.game_name, inst),
            _ => self.game_name.clone(),
        }
    }
}

/// (id, name) pair for player listings
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRef {
    pub player_id: i64,
    pub player_name: String,
}

/// (id, name) pair for game listings
#[derive(Debug, Clone, Serialize)]
pub struct GameRef {
    pub game_id: i64,
    pub game_name: String,
}

/// Full game details
#[derive(Debug, Clone, Serialize)]
pub struct GameDetails {
    pub game_name: String,
    pub game_installment: Option<String>,
    pub game_genre: Option<String>,
    pub game_subgenre: Option<String>,
}

/// Installment listing entry; NULL installments render as "(Main Game)"
#[derive(Debug, Clone, Serialize)]
pub struct InstallmentRef {
    pub game_id: i64,
    pub installment_name: String,
}

/// The single mutable "currently observed" selection
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardState {
    pub current_player_id: Option<i64>,
    pub current_game_id: Option<i64>,
}

impl DashboardState {
    /// Both ids set, or nothing
    pub fn selection(&self) -> Option<(i64, i64)> {
        match (self.current_player_id, self.current_game_id) {
            (Some(p), Some(g)) => Some((p, g)),
            _ => None,
        }
    }
}

/// Outcome of deleting a single stat row
#[derive(Debug, Clone, Copy)]
pub struct StatDeletion {
    pub game_id: i64,
    /// No stats remain for this game at all (across every user)
    pub last_stat_deleted: bool,
}

/// One session's value for a stat type, for chart series
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionPoint {
    pub played_at: i64,
    pub value: i64,
}
