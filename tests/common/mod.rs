//! Shared helpers for integration tests

use chrono::{DateTime, TimeZone, Utc};
use statline::store::{GameIdentity, NewStat, StatStore};
use tempfile::TempDir;

pub fn open_store() -> (TempDir, StatStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StatStore::with_path(&dir.path().join("stats.db")).expect("open store");
    (dir, store)
}

/// Create a trusted user, a player, and a game; return (user, player, game).
pub fn seed_pair(store: &StatStore, email: &str, player: &str, game: &str) -> (i64, i64, i64) {
    let recorder = store.recorder();
    let (user_id, _) = recorder.ensure_user(email, true).expect("user");
    let game_id = recorder
        .ensure_game(
            &GameIdentity {
                game_name: game.to_string(),
                ..Default::default()
            },
            1_000,
        )
        .expect("game");
    let player_id = recorder.ensure_player(player, user_id, 1_000).expect("player");
    (user_id, player_id, game_id)
}

/// Record one session: each entry is (stat_type, value, win).
pub fn record_session(
    store: &StatStore,
    player_id: i64,
    game_id: i64,
    entries: &[(&str, i64, Option<i64>)],
    played_at: DateTime<Utc>,
) {
    let batch: Vec<NewStat> = entries
        .iter()
        .map(|(stat_type, value, win)| NewStat {
            stat_type: Some(stat_type.to_string()),
            stat_value: Some(*value),
            game_mode: None,
            game_level: None,
            win: *win,
            ranked: None,
            pre_match_rank_value: None,
            post_match_rank_value: None,
        })
        .collect();
    store
        .recorder()
        .insert_stats(player_id, game_id, &batch, played_at.timestamp_millis())
        .expect("insert session");
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().expect("valid instant")
}
