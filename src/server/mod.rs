//! HTTP server for the management API and the overlay endpoints
//!
//! Routes:
//! - `POST /api/login`, `/api/add_user`, `/api/add_trusted_user` — static
//!   API key (`X-API-KEY` header)
//! - `/api/*` management endpoints — bearer session token
//! - `GET /api/live_dashboard`, `GET /api/stat_ticker` — shared secret
//!   (`?key=` query parameter)
//! - `GET /health`, `GET /db_health` — open
//!
//! Authorization is checked before any database work.

mod handlers;

use std::io::Read;

use anyhow::{Context, Result};
use serde_json::Value;
use tiny_http::{Response, Server};
use tracing::{error, info};

use crate::auth::{self, Claims};
use crate::config::Config;
use crate::dashboard::{DashboardEngine, TickerEngine};
use crate::error::ApiError;
use crate::social::SocialPoster;
use crate::store::StatStore;

const API_KEY_HEADER: &str = "X-API-KEY";
const MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MiB

/// Everything the handlers need
pub struct AppState {
    pub config: Config,
    pub store: StatStore,
    pub dashboard: DashboardEngine,
    pub ticker: TickerEngine,
    pub poster: SocialPoster,
}

impl AppState {
    pub fn new(config: Config, store: StatStore) -> Self {
        let dashboard = DashboardEngine::new(store.db());
        let ticker = TickerEngine::new(store.db());
        let poster = SocialPoster::new(config.social.clone());
        Self {
            config,
            store,
            dashboard,
            ticker,
            poster,
        }
    }
}

/// The bound API server
pub struct ApiServer {
    server: Server,
    state: AppState,
}

impl ApiServer {
    /// Bind the listener. Port 0 picks an ephemeral port.
    pub fn bind(addr: &str, state: AppState) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))
            .context("Failed to start HTTP server")?;
        Ok(Self { server, state })
    }

    /// Port actually bound (for ephemeral binds)
    pub fn port(&self) -> u16 {
        self.server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .unwrap_or(0)
    }

    /// Serve requests until the process exits.
    pub fn run(self) {
        info!("Server listening on port {}", self.port());

        for mut request in self.server.incoming_requests() {
            let method = request.method().to_string();
            let url = request.url().to_string();
            let path = url.split('?').next().unwrap_or(url.as_str()).to_string();

            let result = dispatch(&self.state, &mut request, &method, &path, &url);
            respond(request, result);
        }
    }
}

fn dispatch(
    state: &AppState,
    request: &mut tiny_http::Request,
    method: &str,
    path: &str,
    url: &str,
) -> Result<(u16, Value), ApiError> {
    match (method, path) {
        ("GET", "/health") => handlers::health(),
        ("GET", "/db_health") => handlers::db_health(state),

        // API-key protected
        ("POST", "/api/login") => {
            check_api_key(request, &state.config)?;
            let body = read_body(request)?;
            handlers::login(state, &body)
        }
        ("POST", "/api/add_user") => {
            check_api_key(request, &state.config)?;
            let body = read_body(request)?;
            handlers::add_user(state, &body)
        }
        ("POST", "/api/add_trusted_user") => {
            check_api_key(request, &state.config)?;
            let body = read_body(request)?;
            handlers::add_trusted_user(state, &body)
        }

        // Session-token protected
        ("POST", "/api/add_stats") => {
            let claims = authenticate(request, &state.config)?;
            let body = read_body(request)?;
            handlers::add_stats(state, &claims, &body)
        }
        ("POST", "/api/set_live_state") => {
            let claims = authenticate(request, &state.config)?;
            let body = read_body(request)?;
            handlers::set_live_state(state, &claims, &body)
        }
        ("GET", "/api/get_players") => {
            let claims = authenticate(request, &state.config)?;
            handlers::get_players(state, &claims)
        }
        ("GET", "/api/get_games") => {
            let claims = authenticate(request, &state.config)?;
            handlers::get_games(state, &claims)
        }
        ("GET", "/api/get_game_franchises") => {
            let claims = authenticate(request, &state.config)?;
            handlers::get_game_franchises(state, &claims)
        }
        ("GET", p) if p.starts_with("/api/get_game_installments/") => {
            let claims = authenticate(request, &state.config)?;
            let franchise = url_decode(trailing_segment(p, "/api/get_game_installments/"));
            handlers::get_game_installments(state, &claims, &franchise)
        }
        ("GET", p) if p.starts_with("/api/get_game_details/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/get_game_details/")?;
            handlers::get_game_details(state, &claims, game_id)
        }
        ("GET", p) if p.starts_with("/api/get_game_ranks/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/get_game_ranks/")?;
            handlers::get_game_ranks(state, &claims, game_id)
        }
        ("GET", p) if p.starts_with("/api/get_game_modes/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/get_game_modes/")?;
            handlers::get_game_modes(state, &claims, game_id)
        }
        ("GET", p) if p.starts_with("/api/get_game_stat_types/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/get_game_stat_types/")?;
            handlers::get_game_stat_types(state, &claims, game_id)
        }
        ("PUT", p) if p.starts_with("/api/update_player/") => {
            let claims = authenticate(request, &state.config)?;
            let player_id = parse_id(p, "/api/update_player/")?;
            let body = read_body(request)?;
            handlers::update_player(state, &claims, player_id, &body)
        }
        ("DELETE", p) if p.starts_with("/api/delete_player/") => {
            let claims = authenticate(request, &state.config)?;
            let player_id = parse_id(p, "/api/delete_player/")?;
            handlers::delete_player(state, &claims, player_id)
        }
        ("PUT", p) if p.starts_with("/api/update_game/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/update_game/")?;
            let body = read_body(request)?;
            handlers::update_game(state, &claims, game_id, &body)
        }
        ("DELETE", p) if p.starts_with("/api/delete_game/") => {
            let claims = authenticate(request, &state.config)?;
            let game_id = parse_id(p, "/api/delete_game/")?;
            handlers::delete_game(state, &claims, game_id)
        }
        ("DELETE", p) if p.starts_with("/api/delete_stats/") => {
            let claims = authenticate(request, &state.config)?;
            let stat_id = parse_id(p, "/api/delete_stats/")?;
            handlers::delete_stats(state, &claims, stat_id)
        }

        // Shared-secret overlay endpoints
        ("GET", "/api/live_dashboard") => {
            check_dashboard_key(url, &state.config)?;
            let tz = query_param(url, "tz").unwrap_or_else(|| "UTC".to_string());
            handlers::live_dashboard(state, &tz)
        }
        ("GET", "/api/stat_ticker") => {
            check_dashboard_key(url, &state.config)?;
            let tz = query_param(url, "tz").unwrap_or_else(|| "UTC".to_string());
            handlers::stat_ticker(state, &tz)
        }

        _ => Err(ApiError::NotFound("not_found".to_string())),
    }
}

fn respond(request: tiny_http::Request, result: Result<(u16, Value), ApiError>) {
    match result {
        Ok((status, value)) => respond_json(request, status, value),
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!("Request failed: {e}");
            }
            respond_json(request, status, serde_json::json!({ "error": e.to_string() }));
        }
    }
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let response = Response::from_string(body)
        .with_status_code(status_code)
        .with_header(json_content_type());
    let _ = request.respond(response);
}

fn json_content_type() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid")
}

fn read_body(request: &mut tiny_http::Request) -> Result<String, ApiError> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    reader
        .read_to_string(&mut body)
        .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {e}")))?;

    if body.len() > MAX_BODY_BYTES {
        return Err(ApiError::BadRequest("payload too large".to_string()));
    }
    Ok(body)
}

fn header_value<'a>(request: &'a tiny_http::Request, name: &str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|h| name.eq_ignore_ascii_case(h.field.as_str().as_str()))
        .map(|h| h.value.as_str())
}

/// Static API key check (login and user administration)
fn check_api_key(request: &tiny_http::Request, config: &Config) -> Result<(), ApiError> {
    let expected = &config.auth.api_key;
    if expected.is_empty() {
        return Err(ApiError::unauthorized());
    }
    match header_value(request, API_KEY_HEADER) {
        Some(key) if key == expected => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Session-token check for management endpoints
fn authenticate(request: &tiny_http::Request, config: &Config) -> Result<Claims, ApiError> {
    let header = header_value(request, "Authorization")
        .ok_or_else(|| ApiError::Unauthorized("JWT is missing or malformed".to_string()))?;
    let token = auth::bearer_token(header)
        .ok_or_else(|| ApiError::Unauthorized("JWT is missing or malformed".to_string()))?;

    auth::verify_token(&config.auth.jwt_secret, token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Shared-secret check for the overlay endpoints
fn check_dashboard_key(url: &str, config: &Config) -> Result<(), ApiError> {
    let expected = &config.auth.dashboard_key;
    if expected.is_empty() {
        return Err(ApiError::Unauthorized(
            "Unauthorized. Invalid or missing key.".to_string(),
        ));
    }
    match query_param(url, "key") {
        Some(key) if &key == expected => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "Unauthorized. Invalid or missing key.".to_string(),
        )),
    }
}

fn parse_id(path: &str, prefix: &str) -> Result<i64, ApiError> {
    trailing_segment(path, prefix)
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest("invalid id".to_string()))
}

fn trailing_segment<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix)
        .unwrap_or(path)
        .trim_end_matches('/')
}

/// Value of a query parameter, percent-decoded
pub(crate) fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return Some(url_decode(value));
        }
    }
    None
}

fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = s.get(i + 1..i + 3);
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_parsing() {
        let url = "/api/live_dashboard?key=abc&tz=America%2FNew_York";
        assert_eq!(query_param(url, "key"), Some("abc".to_string()));
        assert_eq!(
            query_param(url, "tz"),
            Some("America/New_York".to_string())
        );
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("/api/live_dashboard", "key"), None);
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("a+b"), "a b");
        assert_eq!(url_decode("a%20b"), "a b");
        assert_eq!(url_decode("America/New_York"), "America/New_York");
        assert_eq!(url_decode("bad%zz"), "bad%zz");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("/api/delete_stats/42", "/api/delete_stats/").unwrap(), 42);
        assert!(parse_id("/api/delete_stats/abc", "/api/delete_stats/").is_err());
    }
}
