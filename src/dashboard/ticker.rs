//! Educational stat facts for the overlay ticker
//!
//! Fact tiers unlock with play volume: basic records from the first
//! session, descriptive statistics from the third, and the advanced tier
//! past thirty sessions. The numbers are computed here from fetched
//! values rather than pushed into SQL.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::engine::{local_date_of, resolve_zone};
use crate::error::ApiError;
use crate::store::Db;

/// Sessions needed before descriptive statistics appear
const DESCRIPTIVE_TIER_MIN: i64 = 3;

/// Sessions needed before advanced statistics appear
const ADVANCED_TIER_MIN: i64 = 30;

/// Ticker payload
#[derive(Debug, Clone, Serialize)]
pub struct TickerFacts {
    pub facts: Vec<String>,
    pub games_played: i64,
}

/// Builds ticker facts for the live selection
#[derive(Clone)]
pub struct TickerEngine {
    db: Db,
}

impl TickerEngine {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn live_facts(&self, tz_name: &str) -> Result<TickerFacts, ApiError> {
        let conn = self.db.acquire()?;

        let (player_id, game_id): (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT current_player_id, current_game_id
                 FROM dim_dashboard_state WHERE state_id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .unwrap_or((None, None));

        let (player_id, game_id) = match (player_id, game_id) {
            (Some(p), Some(g)) => (p, g),
            _ => {
                return Err(ApiError::NotConfigured(
                    "No live game/player selected".to_string(),
                ))
            }
        };

        let player_name: String = conn
            .query_row(
                "SELECT player_name FROM dim_players WHERE player_id = ?1",
                [player_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Player not found".to_string()))?;

        let (game_name, installment): (String, Option<String>) = conn
            .query_row(
                "SELECT game_name, game_installment FROM dim_games WHERE game_id = ?1",
                [game_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Game not found".to_string()))?;
        let full_game_name = match installment.as_deref() {
            Some(inst) if !inst.is_empty() => format!("{game_name}: {inst}"),
            _ => game_name,
        };

        let games_played: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT played_at) FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2",
            params![player_id, game_id],
            |r| r.get(0),
        )?;

        if games_played == 0 {
            return Ok(TickerFacts {
                facts: vec![
                    "No stats recorded yet. Start playing to see educational stats!".to_string(),
                ],
                games_played: 0,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT DISTINCT stat_type FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2 AND stat_type IS NOT NULL",
        )?;
        let stat_types: Vec<String> = stmt
            .query_map(params![player_id, game_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        let mut facts = basic_facts(
            &conn,
            player_id,
            game_id,
            &player_name,
            &full_game_name,
            &stat_types,
            tz_name,
        )?;

        if games_played >= DESCRIPTIVE_TIER_MIN {
            facts.extend(descriptive_facts(
                &conn,
                player_id,
                game_id,
                &player_name,
                &full_game_name,
                &stat_types,
            )?);
        }

        if games_played > ADVANCED_TIER_MIN {
            facts.extend(advanced_facts(
                &conn,
                player_id,
                game_id,
                &player_name,
                &full_game_name,
                &stat_types,
            )?);
        }

        Ok(TickerFacts {
            facts,
            games_played,
        })
    }
}

/// Tier 1: best performances and the overall high score
fn basic_facts(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    player: &str,
    game: &str,
    stat_types: &[String],
    tz_name: &str,
) -> Result<Vec<String>, ApiError> {
    let zone = resolve_zone(tz_name);
    let mut facts = Vec::new();

    for stat_type in stat_types.iter().take(3) {
        let best: Option<(i64, i64)> = conn
            .query_row(
                "SELECT stat_value, played_at FROM fact_game_stats
                 WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
                   AND stat_value IS NOT NULL
                 ORDER BY stat_value DESC LIMIT 1",
                params![player_id, game_id, stat_type],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        if let Some((value, played_at)) = best {
            let date = local_date_of(zone, played_at).format("%B %d, %Y");
            facts.push(format!(
                "{player}'s best {stat_type} in {game} was {value} on {date}."
            ));
        }
    }

    let high: Option<(String, i64)> = conn
        .query_row(
            "SELECT stat_type, MAX(stat_value) AS high_score
             FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2 AND stat_value IS NOT NULL
             GROUP BY stat_type
             ORDER BY high_score DESC LIMIT 1",
            params![player_id, game_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    if let Some((stat_type, high_score)) = high {
        facts.push(format!(
            "The highest {stat_type} recorded for {game} is {high_score}."
        ));
    }

    Ok(facts)
}

/// Tier 2: mean, median, mode, min, max, range
fn descriptive_facts(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    player: &str,
    game: &str,
    stat_types: &[String],
) -> Result<Vec<String>, ApiError> {
    let mut facts = Vec::new();

    for stat_type in stat_types.iter().take(2) {
        let values = sorted_values(conn, player_id, game_id, stat_type)?;
        if values.is_empty() {
            continue;
        }

        let mean = round1(values.iter().sum::<i64>() as f64 / values.len() as f64);
        let median = median_of(&values);
        let min = values[0];
        let max = values[values.len() - 1];
        let range = max - min;
        let (mode, mode_count) = mode_of(&values);

        facts.push(format!(
            "On average, {player} gets {} {stat_type} per game in {game}.",
            format_number(mean)
        ));
        facts.push(format!(
            "The median {stat_type} for {player} in {game} is {}.",
            format_number(median)
        ));
        if mode_count > 1 {
            facts.push(format!(
                "{player} most frequently scores {mode} {stat_type} in {game}."
            ));
        }
        facts.push(format!(
            "{player}'s {stat_type} in {game} ranges from {min} (minimum) to {max} (maximum)."
        ));
        facts.push(format!(
            "The range of {stat_type} scores in {game} is {range}."
        ));
    }

    Ok(facts)
}

/// Tier 3: standard deviation, variance, percentiles
fn advanced_facts(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    player: &str,
    game: &str,
    stat_types: &[String],
) -> Result<Vec<String>, ApiError> {
    let mut facts = Vec::new();

    for stat_type in stat_types.iter().take(2) {
        let values = sorted_values(conn, player_id, game_id, stat_type)?;
        if values.len() < 2 {
            continue;
        }

        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        let mean = floats.iter().sum::<f64>() / floats.len() as f64;
        let variance = floats.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / floats.len() as f64;
        let std_dev = round2(variance.sqrt());
        let variance = round2(variance);

        let p25 = round1(percentile(&floats, 0.25));
        let p50 = round1(percentile(&floats, 0.50));
        let p75 = round1(percentile(&floats, 0.75));

        let variability = if std_dev > mean * 0.3 { "high" } else { "low" };
        facts.push(format!(
            "The standard deviation of {stat_type} in {game} is {}, showing {variability} variability in performance.",
            format_number(std_dev)
        ));
        facts.push(format!(
            "The variance of {player}'s {stat_type} in {game} is {}.",
            format_number(variance)
        ));
        facts.push(format!(
            "25% of {player}'s games have {stat_type} below {}, while 75% are below {}.",
            format_number(p25),
            format_number(p75)
        ));
        facts.push(format!(
            "The median (50th percentile) {stat_type} is {} for {player} in {game}.",
            format_number(p50)
        ));
    }

    Ok(facts)
}

fn sorted_values(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    stat_type: &str,
) -> Result<Vec<i64>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT stat_value FROM fact_game_stats
         WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
           AND stat_value IS NOT NULL
         ORDER BY stat_value",
    )?;
    let rows = stmt.query_map(params![player_id, game_id, stat_type], |row| row.get(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn median_of(sorted: &[i64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        round1((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0)
    }
}

/// Most common value; ties resolve to the smallest (input is sorted)
fn mode_of(sorted: &[i64]) -> (i64, usize) {
    let mut best = (sorted[0], 0);
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best.1 {
            best = (sorted[i], j - i);
        }
        i = j;
    }
    best
}

/// Linear-interpolated percentile over sorted data
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let k = (n - 1) as f64 * p;
    let f = k.floor() as usize;
    let c = k - f as f64;
    if f + 1 < n {
        sorted[f] + c * (sorted[f + 1] - sorted[f])
    } else {
        sorted[f]
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Whole numbers print without a trailing ".0"
fn format_number(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}
