//! Request handlers
//!
//! Handlers return `(status, json)` or an `ApiError`; the router turns
//! errors into status codes. User identity comes from the session token
//! but is re-checked against the users table on every call, so a revoked
//! trust flag takes effect before the token expires.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::AppState;
use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::store::{GameIdentity, NewStat};

type Reply = Result<(u16, Value), ApiError>;

#[derive(Deserialize)]
struct EmailRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
struct TrustedUserRequest {
    email: Option<String>,
    #[serde(default = "default_true")]
    is_trusted: bool,
}

#[derive(Deserialize)]
struct AddStatsRequest {
    game_name: Option<String>,
    game_installment: Option<String>,
    game_genre: Option<String>,
    game_subgenre: Option<String>,
    player_name: Option<String>,
    stats: Option<Vec<NewStat>>,
    #[serde(default)]
    is_live: bool,
}

#[derive(Deserialize)]
struct UpdatePlayerRequest {
    player_name: Option<String>,
}

#[derive(Deserialize)]
struct UpdateGameRequest {
    game_name: Option<String>,
    game_installment: Option<String>,
    game_genre: Option<String>,
    game_subgenre: Option<String>,
}

#[derive(Deserialize)]
struct SetLiveStateRequest {
    player_id: Option<i64>,
    game_id: Option<i64>,
}

fn default_true() -> bool {
    true
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Resolve the token's user against the database.
fn require_user(state: &AppState, claims: &Claims) -> Result<(i64, bool), ApiError> {
    state
        .store
        .recorder()
        .find_user(&claims.email)?
        .ok_or_else(|| ApiError::NotFound("Authenticated user not found.".to_string()))
}

fn require_trusted(state: &AppState, claims: &Claims) -> Result<i64, ApiError> {
    let (user_id, is_trusted) = require_user(state, claims)?;
    if !is_trusted {
        return Err(ApiError::Forbidden("User not authorized".to_string()));
    }
    Ok(user_id)
}

// --- Health ---

pub fn health() -> Reply {
    Ok((200, json!({ "status": "healthy" })))
}

pub fn db_health(state: &AppState) -> Reply {
    let db = state.store.db();
    let result = db
        .acquire()
        .and_then(|conn| conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).map_err(Into::into));

    match result {
        Ok(_) => Ok((200, json!({ "status": "healthy", "db_connection": "successful" }))),
        Err(e) => {
            warn!("DB health check failed: {e}");
            Ok((503, json!({ "status": "unhealthy", "db_connection": "failed" })))
        }
    }
}

// --- Users / login ---

/// Find-or-create the user, sync the trust flag with the configured
/// list, and hand back a session token.
pub fn login(state: &AppState, body: &str) -> Reply {
    let req: EmailRequest = parse_body(body)?;
    let email = req
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let should_be_trusted = state.config.is_trusted_email(&email);
    let recorder = state.store.recorder();

    let (user_id, is_trusted) = match recorder.find_user(&email)? {
        Some((user_id, db_trusted)) => {
            if db_trusted != should_be_trusted {
                recorder.set_trusted(&email, should_be_trusted)?;
            }
            (user_id, should_be_trusted)
        }
        None => recorder.ensure_user(&email, should_be_trusted)?,
    };

    let token = auth::issue_token(&state.config.auth.jwt_secret, &email, user_id, is_trusted)
        .map_err(|e| ApiError::Internal(format!("token issue failed: {e}")))?;

    Ok((200, json!({ "token": token, "is_trusted": is_trusted })))
}

/// Register a guest (non-trusted) user.
pub fn add_user(state: &AppState, body: &str) -> Reply {
    let req: EmailRequest = parse_body(body)?;
    let email = req
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let recorder = state.store.recorder();
    if recorder.find_user(&email)?.is_some() {
        return Ok((200, json!({ "message": format!("User {email} already exists.") })));
    }

    recorder.ensure_user(&email, false)?;
    Ok((
        201,
        json!({ "message": format!("User {email} registered successfully.") }),
    ))
}

/// Manual admin control over the trust flag.
pub fn add_trusted_user(state: &AppState, body: &str) -> Reply {
    let req: TrustedUserRequest = parse_body(body)?;
    let email = req
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    state.store.recorder().upsert_trusted(&email, req.is_trusted)?;
    Ok((
        201,
        json!({
            "message": format!(
                "User {email} added/updated successfully. Trusted status set to: {}.",
                req.is_trusted
            )
        }),
    ))
}

// --- Stat ingestion ---

pub fn add_stats(state: &AppState, claims: &Claims, body: &str) -> Reply {
    let req: AddStatsRequest = parse_body(body)?;

    let game_name = req.game_name.clone().unwrap_or_default();
    let player_name = req.player_name.clone().unwrap_or_default();
    let stats = req.stats.clone().unwrap_or_default();
    if game_name.is_empty() || player_name.is_empty() || stats.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing or invalid fields: game_name, player_name, and stats (must be a non-empty list)"
                .to_string(),
        ));
    }

    let user_id = require_trusted(state, claims)?;
    let now = Utc::now();
    let now_ms = now.timestamp_millis();

    let game = GameIdentity {
        game_name,
        game_installment: req.game_installment.clone(),
        game_genre: req.game_genre.clone(),
        game_subgenre: req.game_subgenre.clone(),
    };

    let recorder = state.store.recorder();
    let game_id = recorder.ensure_game(&game, now_ms)?;
    let player_id = recorder.ensure_player(&player_name, user_id, now_ms)?;

    let inserted = recorder.insert_stats(player_id, game_id, &stats, now_ms)?;
    if inserted == 0 {
        return Err(ApiError::BadRequest(
            "No valid stats provided to insert.".to_string(),
        ));
    }

    // Social posting is best-effort: failures are logged, the stats stay.
    match state.poster.post_session_update(
        &state.store.query(),
        player_id,
        game_id,
        &player_name,
        &game,
        req.is_live,
        now,
    ) {
        Ok(outcome) => {
            if let crate::social::PostOutcome::Skipped(reason) = outcome {
                warn!("Social post skipped: {reason}");
            }
        }
        Err(e) => warn!("Social post failed (stats still saved): {e}"),
    }

    Ok((
        201,
        json!({ "message": format!("Stats successfully added ({inserted} records)!") }),
    ))
}

// --- Players ---

pub fn get_players(state: &AppState, claims: &Claims) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let players = state.store.query().players_for_user(user_id)?;
    Ok((200, json!({ "players": players })))
}

pub fn update_player(state: &AppState, claims: &Claims, player_id: i64, body: &str) -> Reply {
    let req: UpdatePlayerRequest = parse_body(body)?;
    let new_name = req
        .player_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("New player_name is required".to_string()))?;

    let user_id = require_trusted(state, claims)?;
    if !state.store.recorder().update_player(player_id, user_id, &new_name)? {
        return Err(ApiError::NotFound(
            "Player not found or user not authorized.".to_string(),
        ));
    }
    Ok((200, json!({ "message": "Player updated successfully." })))
}

pub fn delete_player(state: &AppState, claims: &Claims, player_id: i64) -> Reply {
    let user_id = require_trusted(state, claims)?;
    if !state.store.recorder().delete_player(player_id, user_id)? {
        return Err(ApiError::NotFound(
            "Player not found or permission denied.".to_string(),
        ));
    }
    Ok((
        200,
        json!({ "message": "Player and all associated stats deleted." }),
    ))
}

// --- Games ---

pub fn get_games(state: &AppState, claims: &Claims) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let games = state.store.query().games_for_user(user_id)?;
    Ok((200, json!({ "games": games })))
}

pub fn get_game_details(state: &AppState, claims: &Claims, game_id: i64) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let queries = state.store.query();

    if !queries.user_has_game_stats(game_id, user_id)? {
        return Err(ApiError::NotFound(
            "Game not found or user has no stats for it.".to_string(),
        ));
    }
    let details = queries
        .game_details(game_id)?
        .ok_or_else(|| ApiError::NotFound("Game not found.".to_string()))?;
    Ok((200, serde_json::to_value(details).unwrap_or_default()))
}

pub fn update_game(state: &AppState, claims: &Claims, game_id: i64, body: &str) -> Reply {
    let req: UpdateGameRequest = parse_body(body)?;
    let game_name = req
        .game_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("New game_name is required".to_string()))?;

    let user_id = require_trusted(state, claims)?;
    if !state.store.query().user_has_game_stats(game_id, user_id)? {
        return Err(ApiError::NotFound(
            "Game not found or user has no stats for it.".to_string(),
        ));
    }

    let game = GameIdentity {
        game_name,
        game_installment: req.game_installment,
        game_genre: req.game_genre,
        game_subgenre: req.game_subgenre,
    };
    if !state.store.recorder().update_game(game_id, &game)? {
        return Err(ApiError::NotFound("Game not found.".to_string()));
    }
    Ok((200, json!({ "message": "Game updated successfully." })))
}

pub fn delete_game(state: &AppState, claims: &Claims, game_id: i64) -> Reply {
    require_trusted(state, claims)?;

    if state.store.query().game_has_stats(game_id)? {
        return Err(ApiError::Conflict(
            "Cannot delete game. All associated stats must be deleted first.".to_string(),
        ));
    }
    if !state.store.recorder().delete_game(game_id)? {
        return Err(ApiError::NotFound("Game not found.".to_string()));
    }
    Ok((200, json!({ "message": "Game successfully deleted." })))
}

// --- Stats ---

pub fn delete_stats(state: &AppState, claims: &Claims, stat_id: i64) -> Reply {
    let user_id = require_trusted(state, claims)?;

    let outcome = state
        .store
        .recorder()
        .delete_stat(stat_id, user_id)?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Stat with ID {stat_id} not found or permission denied."
            ))
        })?;

    let mut reply = json!({ "message": "Entry successfully deleted." });
    if outcome.last_stat_deleted {
        reply["last_stat_deleted"] = json!(true);
        reply["game_id"] = json!(outcome.game_id);
    }
    Ok((200, reply))
}

// --- Game metadata listings ---

pub fn get_game_ranks(state: &AppState, claims: &Claims, game_id: i64) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let ranks = state.store.query().game_ranks(game_id, user_id)?;
    Ok((200, json!({ "ranks": ranks })))
}

pub fn get_game_modes(state: &AppState, claims: &Claims, game_id: i64) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let modes = state.store.query().game_modes(game_id, user_id)?;
    Ok((200, json!({ "game_modes": modes })))
}

pub fn get_game_stat_types(state: &AppState, claims: &Claims, game_id: i64) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let stat_types = state.store.query().stat_types_for_user(game_id, user_id)?;
    Ok((200, json!({ "stat_types": stat_types })))
}

pub fn get_game_franchises(state: &AppState, claims: &Claims) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let franchises = state.store.query().franchises_for_user(user_id)?;
    Ok((200, json!({ "game_franchises": franchises })))
}

pub fn get_game_installments(state: &AppState, claims: &Claims, franchise: &str) -> Reply {
    let (user_id, _) = require_user(state, claims)?;
    let installments = state
        .store
        .query()
        .installments_for_user(user_id, franchise)?;
    Ok((200, json!({ "game_installments": installments })))
}

// --- Live overlay ---

/// Overwrite the live selection. Concurrent writers race with
/// last-write-wins semantics.
pub fn set_live_state(state: &AppState, claims: &Claims, body: &str) -> Reply {
    let req: SetLiveStateRequest = parse_body(body)?;
    let (player_id, game_id) = match (req.player_id, req.game_id) {
        (Some(p), Some(g)) => (p, g),
        _ => {
            return Err(ApiError::BadRequest(
                "player_id and game_id are required".to_string(),
            ))
        }
    };

    require_trusted(state, claims)?;
    state
        .store
        .recorder()
        .set_live_state(player_id, game_id, Utc::now().timestamp_millis())?;
    Ok((200, json!({ "message": "Live state updated" })))
}

pub fn live_dashboard(state: &AppState, tz: &str) -> Reply {
    let selection = state.dashboard.live_selection(tz, Utc::now())?;
    Ok((200, selection.to_json()))
}

pub fn stat_ticker(state: &AppState, tz: &str) -> Reply {
    let facts = state.ticker.live_facts(tz)?;
    Ok((
        200,
        serde_json::to_value(facts)
            .map_err(|e| ApiError::Internal(format!("serialize failed: {e}")))?,
    ))
}
