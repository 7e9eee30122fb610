//! Live dashboard aggregation rules
//!
//! Decides, for the currently selected player/game pair, which stats the
//! overlay shows and how each value is computed:
//!
//! - A game that has ever recorded a win/loss is "win-tracked": the
//!   overlay shows WINS plus the 2 lowest-average stat types. Otherwise
//!   it shows the 3 lowest-average types.
//! - Values come from today (in the caller's timezone) when today has
//!   records, else from the most recent earlier day.
//! - Today's values are sums; a past day's values are rounded averages.
//!
//! Brand-new games and pairs with no history get fixed placeholder
//! payloads instead of errors.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::store::Db;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Which date's data backs a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    Today,
    Past,
    /// Selected pair has no history at all
    NotAvailable,
    /// Game has no usable stats and no win tracking
    NewGame,
}

impl TimePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "TODAY",
            Self::Past => "PAST",
            Self::NotAvailable => "N/A",
            Self::NewGame => "NEW GAME",
        }
    }
}

/// A displayed stat value: a number, or the "---" no-data sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatValue {
    Count(i64),
    Missing,
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_i64(*n),
            Self::Missing => serializer.serialize_str("---"),
        }
    }
}

/// One labeled entry on the overlay
#[derive(Debug, Clone, Serialize)]
pub struct StatEntry {
    pub label: String,
    pub value: StatValue,
}

/// Ordered overlay payload: up to 3 stats (WINS first when present)
#[derive(Debug, Clone)]
pub struct StatSelection {
    pub entries: Vec<StatEntry>,
    pub time_period: TimePeriod,
}

impl StatSelection {
    /// JSON shape consumed by the overlay: `{"stat1": {...}, ..., "time_period": "..."}`
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (i, entry) in self.entries.iter().enumerate() {
            map.insert(
                format!("stat{}", i + 1),
                json!({ "label": entry.label, "value": entry.value }),
            );
        }
        map.insert("time_period".to_string(), json!(self.time_period.as_str()));
        Value::Object(map)
    }
}

/// Abbreviate a stat label for the overlay.
///
/// Strips "Total" and "Average" (case-sensitive, anywhere), trims, then
/// shortens anything longer than 8 characters to its first 4 uppercased
/// plus "S". WINS is never passed through here.
pub fn abbreviate_stat(name: &str) -> String {
    if name.is_empty() {
        return "XXXX".to_string();
    }
    let clean = name.replace("Total", "").replace("Average", "");
    let clean = clean.trim();
    if clean.chars().count() > 8 {
        let head: String = clean.chars().take(4).collect();
        format!("{}S", head.to_uppercase())
    } else {
        clean.to_uppercase()
    }
}

/// Parse an IANA zone name, falling back to UTC.
///
/// The fallback is logged but never surfaced to the caller.
pub fn resolve_zone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(zone) => zone,
        Err(_) => {
            warn!("Unknown timezone '{tz_name}', defaulting to UTC");
            Tz::UTC
        }
    }
}

/// Runs the selection rules against the store
#[derive(Clone)]
pub struct DashboardEngine {
    db: Db,
}

impl DashboardEngine {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Selection for the pair currently set on the dashboard-state row.
    pub fn live_selection(
        &self,
        tz_name: &str,
        now: DateTime<Utc>,
    ) -> Result<StatSelection, ApiError> {
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

        self.selection_for(&conn, player_id, game_id, tz_name, now)
    }

    /// Selection for an explicit pair. Single read-and-compute pass on
    /// one connection; any failed query aborts the whole operation.
    pub fn selection_for(
        &self,
        conn: &Connection,
        player_id: i64,
        game_id: i64,
        tz_name: &str,
        now: DateTime<Utc>,
    ) -> Result<StatSelection, ApiError> {
        let zone = resolve_zone(tz_name);
        let today = now.with_timezone(&zone).date_naive();

        // Win tracking is a per-game property inferred from data: one
        // non-NULL win ever makes the game win-tracked for good.
        let win_rows: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fact_game_stats WHERE game_id = ?1 AND win IS NOT NULL",
            [game_id],
            |r| r.get(0),
        )?;
        let win_tracked = win_rows > 0;

        let limit = if win_tracked { 2 } else { 3 };
        let top_stats = top_stat_types(conn, game_id, limit)?;

        if top_stats.is_empty() && !win_tracked {
            return Ok(new_game_placeholder());
        }

        let (today_start, today_end) = local_day_bounds(zone, today);
        let stats_today = range_has_stats(conn, player_id, game_id, today_start, today_end)?;

        let (day_start, day_end, time_period) = if stats_today {
            (today_start, today_end, TimePeriod::Today)
        } else {
            let last_played: Option<i64> = conn.query_row(
                "SELECT MAX(played_at) FROM fact_game_stats
                 WHERE player_id = ?1 AND game_id = ?2 AND played_at < ?3",
                params![player_id, game_id, today_start],
                |r| r.get(0),
            )?;

            match last_played {
                Some(ms) => {
                    let date = local_date_of(zone, ms);
                    let (start, end) = local_day_bounds(zone, date);
                    (start, end, TimePeriod::Past)
                }
                None => return Ok(no_history_placeholder(win_tracked, &top_stats)),
            }
        };

        let mut entries = Vec::with_capacity(top_stats.len() + 1);

        if win_tracked {
            let win_count = if time_period == TimePeriod::Today {
                today_win_count(conn, player_id, game_id, day_start, day_end)?
            } else {
                past_win_average(conn, player_id, game_id, day_start, day_end)?
            };
            entries.push(StatEntry {
                label: "WINS".to_string(),
                value: StatValue::Count(win_count),
            });
        }

        for stat_type in &top_stats {
            let value = if time_period == TimePeriod::Today {
                day_sum(conn, player_id, game_id, stat_type, day_start, day_end)?
            } else {
                day_average(conn, player_id, game_id, stat_type, day_start, day_end)?
            };
            entries.push(StatEntry {
                label: abbreviate_stat(stat_type),
                value: StatValue::Count(value),
            });
        }

        Ok(StatSelection {
            entries,
            time_period,
        })
    }
}

fn new_game_placeholder() -> StatSelection {
    let entries = (1..=3)
        .map(|i| StatEntry {
            label: format!("STAT {i}"),
            value: StatValue::Count(0),
        })
        .collect();
    StatSelection {
        entries,
        time_period: TimePeriod::NewGame,
    }
}

fn no_history_placeholder(win_tracked: bool, top_stats: &[String]) -> StatSelection {
    let mut entries = Vec::with_capacity(top_stats.len() + 1);
    if win_tracked {
        entries.push(StatEntry {
            label: "WINS".to_string(),
            value: StatValue::Missing,
        });
    }
    for stat_type in top_stats {
        entries.push(StatEntry {
            label: abbreviate_stat(stat_type),
            value: StatValue::Missing,
        });
    }
    StatSelection {
        entries,
        time_period: TimePeriod::NotAvailable,
    }
}

fn top_stat_types(
    conn: &Connection,
    game_id: i64,
    limit: i64,
) -> Result<Vec<String>, ApiError> {
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
    let rows = stmt.query_map(params![game_id, limit], |row| row.get(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn range_has_stats(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    start_ms: i64,
    end_ms: i64,
) -> Result<bool, ApiError> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2
               AND played_at >= ?3 AND played_at < ?4
             LIMIT 1",
            params![player_id, game_id, start_ms, end_ms],
            |r| r.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// Wins today: distinct sessions with win = 1 on the resolved date.
fn today_win_count(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    start_ms: i64,
    end_ms: i64,
) -> Result<i64, ApiError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT played_at) FROM fact_game_stats
         WHERE player_id = ?1 AND game_id = ?2 AND win = 1
           AND played_at >= ?3 AND played_at < ?4",
        params![player_id, game_id, start_ms, end_ms],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Wins on a past day: average of per-day win counts, grouped by local
/// day. With a single resolved date in scope this reduces to that day's
/// count, but the grouped path is the contract.
fn past_win_average(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    start_ms: i64,
    end_ms: i64,
) -> Result<i64, ApiError> {
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(daily_wins) FROM (
             SELECT (played_at - ?3) / ?5 AS day_index,
                    COUNT(DISTINCT played_at) AS daily_wins
             FROM fact_game_stats
             WHERE player_id = ?1 AND game_id = ?2 AND win = 1
               AND played_at >= ?3 AND played_at < ?4
             GROUP BY day_index
         )",
        params![player_id, game_id, start_ms, end_ms, MS_PER_DAY],
        |r| r.get(0),
    )?;
    Ok(avg.map(|v| v.round() as i64).unwrap_or(0))
}

fn day_sum(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    stat_type: &str,
    start_ms: i64,
    end_ms: i64,
) -> Result<i64, ApiError> {
    let sum: Option<i64> = conn.query_row(
        "SELECT SUM(stat_value) FROM fact_game_stats
         WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
           AND played_at >= ?4 AND played_at < ?5",
        params![player_id, game_id, stat_type, start_ms, end_ms],
        |r| r.get(0),
    )?;
    Ok(sum.unwrap_or(0))
}

fn day_average(
    conn: &Connection,
    player_id: i64,
    game_id: i64,
    stat_type: &str,
    start_ms: i64,
    end_ms: i64,
) -> Result<i64, ApiError> {
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(stat_value) FROM fact_game_stats
         WHERE player_id = ?1 AND game_id = ?2 AND stat_type = ?3
           AND played_at >= ?4 AND played_at < ?5",
        params![player_id, game_id, stat_type, start_ms, end_ms],
        |r| r.get(0),
    )?;
    Ok(avg.map(|v| v.round() as i64).unwrap_or(0))
}

/// Local calendar date of a UTC-millisecond instant.
pub fn local_date_of(zone: Tz, timestamp_ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or_else(Utc::now)
        .with_timezone(&zone)
        .date_naive()
}

/// UTC-millisecond bounds of a local calendar day: [start, next day start).
pub fn local_day_bounds(zone: Tz, date: NaiveDate) -> (i64, i64) {
    let next = date.succ_opt().unwrap_or(date);
    (local_day_start_ms(zone, date), local_day_start_ms(zone, next))
}

fn local_day_start_ms(zone: Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    match zone.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp_millis(),
        // A DST gap swallowed local midnight; read the naive time as UTC.
        None => midnight.and_utc().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate_strips_and_shortens() {
        assert_eq!(abbreviate_stat("Total Eliminations"), "ELIMS");
        assert_eq!(abbreviate_stat("Kills"), "KILLS");
        assert_eq!(abbreviate_stat("Average Damage"), "DAMAGE");
        assert_eq!(abbreviate_stat("Headshots"), "HEADS");
        assert_eq!(abbreviate_stat("Goals"), "GOALS");
        assert_eq!(abbreviate_stat(""), "XXXX");
    }

    #[test]
    fn test_resolve_zone_fallback() {
        assert_eq!(resolve_zone("America/New_York"), Tz::America__New_York);
        assert_eq!(resolve_zone("Not/A_Zone"), Tz::UTC);
        assert_eq!(resolve_zone(""), Tz::UTC);
    }

    #[test]
    fn test_stat_value_serialization() {
        assert_eq!(serde_json::to_value(StatValue::Count(25)).unwrap(), json!(25));
        assert_eq!(
            serde_json::to_value(StatValue::Missing).unwrap(),
            json!("---")
        );
    }

    #[test]
    fn test_selection_json_shape() {
        let selection = StatSelection {
            entries: vec![
                StatEntry {
                    label: "WINS".into(),
                    value: StatValue::Count(3),
                },
                StatEntry {
                    label: "ELIMS".into(),
                    value: StatValue::Count(25),
                },
            ],
            time_period: TimePeriod::Today,
        };
        let json = selection.to_json();
        assert_eq!(json["stat1"]["label"], "WINS");
        assert_eq!(json["stat1"]["value"], 3);
        assert_eq!(json["stat2"]["value"], 25);
        assert_eq!(json["time_period"], "TODAY");
        assert!(json.get("stat3").is_none());
    }

    #[test]
    fn test_local_day_bounds_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let (start, end) = local_day_bounds(Tz::UTC, date);
        assert_eq!(end - start, MS_PER_DAY);
        assert_eq!(local_date_of(Tz::UTC, start), date);
        assert_eq!(local_date_of(Tz::UTC, end - 1), date);
    }

    #[test]
    fn test_local_day_bounds_dst_gap() {
        // US spring-forward: 2024-03-10 has only 23 hours in New York
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let (start, end) = local_day_bounds(Tz::America__New_York, date);
        assert_eq!(end - start, 23 * 60 * 60 * 1000);
    }
}
