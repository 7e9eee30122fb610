//! End-to-end tests against a live server on an ephemeral port

use serde_json::{json, Value};
use statline::config::Config;
use statline::server::{ApiServer, AppState};
use statline::store::StatStore;
use tempfile::TempDir;

const API_KEY: &str = "test-api-key";
const DASH_KEY: &str = "test-dash-key";

struct TestServer {
    port: u16,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path_and_query: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path_and_query)
    }
}

fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StatStore::with_path(&dir.path().join("stats.db")).expect("store");

    let mut config = Config::default();
    config.auth.api_key = API_KEY.to_string();
    config.auth.jwt_secret = "test-jwt-secret".to_string();
    config.auth.dashboard_key = DASH_KEY.to_string();
    config.auth.trusted_emails = vec!["admin@example.com".to_string()];
    config.social.enabled = false;

    let state = AppState::new(config, store);
    let server = ApiServer::bind("127.0.0.1:0", state).expect("bind");
    let port = server.port();
    std::thread::spawn(move || server.run());

    TestServer { port, _dir: dir }
}

fn login(server: &TestServer, email: &str) -> (String, bool) {
    let response = ureq::post(&server.url("/api/login"))
        .set("X-API-KEY", API_KEY)
        .send_json(json!({ "email": email }))
        .expect("login");
    let body: Value = response.into_json().expect("json");
    (
        body["token"].as_str().expect("token").to_string(),
        body["is_trusted"].as_bool().expect("is_trusted"),
    )
}

fn status_of(result: Result<ureq::Response, ureq::Error>) -> u16 {
    match result {
        Ok(response) => response.status(),
        Err(ureq::Error::Status(code, _)) => code,
        Err(e) => panic!("transport error: {e}"),
    }
}

#[test]
fn health_endpoints_are_open() {
    let server = spawn_server();

    let response = ureq::get(&server.url("/health")).call().expect("health");
    let body: Value = response.into_json().expect("json");
    assert_eq!(body["status"], "healthy");

    let response = ureq::get(&server.url("/db_health")).call().expect("db health");
    let body: Value = response.into_json().expect("json");
    assert_eq!(body["db_connection"], "successful");
}

#[test]
fn dashboard_requires_the_shared_secret() {
    let server = spawn_server();

    let missing = ureq::get(&server.url("/api/live_dashboard")).call();
    assert_eq!(status_of(missing), 401);

    let wrong = ureq::get(&server.url("/api/live_dashboard?key=nope")).call();
    assert_eq!(status_of(wrong), 401);

    let ticker = ureq::get(&server.url("/api/stat_ticker?key=nope")).call();
    assert_eq!(status_of(ticker), 401);
}

#[test]
fn login_requires_the_api_key() {
    let server = spawn_server();

    let missing = ureq::post(&server.url("/api/login")).send_json(json!({ "email": "a@b.c" }));
    assert_eq!(status_of(missing), 401);

    let wrong = ureq::post(&server.url("/api/login"))
        .set("X-API-KEY", "nope")
        .send_json(json!({ "email": "a@b.c" }));
    assert_eq!(status_of(wrong), 401);
}

#[test]
fn login_syncs_trust_with_the_configured_list() {
    let server = spawn_server();

    let (_, admin_trusted) = login(&server, "admin@example.com");
    assert!(admin_trusted);

    let (_, guest_trusted) = login(&server, "guest@example.com");
    assert!(!guest_trusted);
}

#[test]
fn management_endpoints_reject_bad_tokens() {
    let server = spawn_server();

    let missing = ureq::get(&server.url("/api/get_players")).call();
    assert_eq!(status_of(missing), 401);

    let garbage = ureq::get(&server.url("/api/get_players"))
        .set("Authorization", "Bearer not-a-token")
        .call();
    assert_eq!(status_of(garbage), 401);
}

#[test]
fn untrusted_users_cannot_ingest_stats() {
    let server = spawn_server();
    let (token, _) = login(&server, "guest@example.com");

    let result = ureq::post(&server.url("/api/add_stats"))
        .set("Authorization", &format!("Bearer {token}"))
        .send_json(json!({
            "game_name": "Halo",
            "player_name": "Chief",
            "stats": [{ "stat_type": "Kills", "stat_value": 10 }]
        }));
    assert_eq!(status_of(result), 403);
}

#[test]
fn dashboard_without_selection_is_not_configured() {
    let server = spawn_server();

    let result = ureq::get(&server.url(&format!("/api/live_dashboard?key={DASH_KEY}"))).call();
    assert_eq!(status_of(result), 404);
}

#[test]
fn full_ingest_select_dashboard_flow() {
    let server = spawn_server();
    let (token, _) = login(&server, "admin@example.com");
    let bearer = format!("Bearer {token}");

    // Ingest one session with win tracking
    let response = ureq::post(&server.url("/api/add_stats"))
        .set("Authorization", &bearer)
        .send_json(json!({
            "game_name": "Apex Legends",
            "player_name": "Wraith",
            "stats": [
                { "stat_type": "Eliminations", "stat_value": 12, "win": 1 },
                { "stat_type": "Respawns", "stat_value": 4, "win": 1 }
            ]
        }))
        .expect("add stats");
    assert_eq!(response.status(), 201);

    // Resolve ids through the listing endpoints
    let players: Value = ureq::get(&server.url("/api/get_players"))
        .set("Authorization", &bearer)
        .call()
        .expect("players")
        .into_json()
        .expect("json");
    let player_id = players["players"][0]["player_id"].as_i64().expect("player id");

    let games: Value = ureq::get(&server.url("/api/get_games"))
        .set("Authorization", &bearer)
        .call()
        .expect("games")
        .into_json()
        .expect("json");
    let game_id = games["games"][0]["game_id"].as_i64().expect("game id");

    // Point the overlay at the pair
    let response = ureq::post(&server.url("/api/set_live_state"))
        .set("Authorization", &bearer)
        .send_json(json!({ "player_id": player_id, "game_id": game_id }))
        .expect("set live state");
    assert_eq!(response.status(), 200);

    // Overlay read: session was recorded "now", so TODAY with sums
    let dashboard: Value = ureq::get(&server.url(&format!("/api/live_dashboard?key={DASH_KEY}")))
        .call()
        .expect("dashboard")
        .into_json()
        .expect("json");
    assert_eq!(dashboard["time_period"], "TODAY");
    assert_eq!(dashboard["stat1"]["label"], "WINS");
    assert_eq!(dashboard["stat1"]["value"], 1);
    assert_eq!(dashboard["stat2"]["label"], "RESPAWNS");
    assert_eq!(dashboard["stat2"]["value"], 4);
    assert_eq!(dashboard["stat3"]["label"], "ELIMS");
    assert_eq!(dashboard["stat3"]["value"], 12);

    // Ticker has basic facts after one session
    let ticker: Value = ureq::get(&server.url(&format!("/api/stat_ticker?key={DASH_KEY}")))
        .call()
        .expect("ticker")
        .into_json()
        .expect("json");
    assert_eq!(ticker["games_played"], 1);
    assert!(!ticker["facts"].as_array().expect("facts").is_empty());
}

#[test]
fn stat_listing_and_deletion_flow() {
    let server = spawn_server();
    let (token, _) = login(&server, "admin@example.com");
    let bearer = format!("Bearer {token}");

    ureq::post(&server.url("/api/add_stats"))
        .set("Authorization", &bearer)
        .send_json(json!({
            "game_name": "Halo",
            "game_installment": "Infinite",
            "player_name": "Chief",
            "stats": [{ "stat_type": "Kills", "stat_value": 10, "game_mode": "Slayer" }]
        }))
        .expect("add stats");

    let games: Value = ureq::get(&server.url("/api/get_games"))
        .set("Authorization", &bearer)
        .call()
        .expect("games")
        .into_json()
        .expect("json");
    let game_id = games["games"][0]["game_id"].as_i64().expect("game id");

    let modes: Value = ureq::get(&server.url(&format!("/api/get_game_modes/{game_id}")))
        .set("Authorization", &bearer)
        .call()
        .expect("modes")
        .into_json()
        .expect("json");
    assert_eq!(modes["game_modes"][0], "Slayer");

    let types: Value = ureq::get(&server.url(&format!("/api/get_game_stat_types/{game_id}")))
        .set("Authorization", &bearer)
        .call()
        .expect("types")
        .into_json()
        .expect("json");
    assert_eq!(types["stat_types"][0], "Kills");

    let franchises: Value = ureq::get(&server.url("/api/get_game_franchises"))
        .set("Authorization", &bearer)
        .call()
        .expect("franchises")
        .into_json()
        .expect("json");
    assert_eq!(franchises["game_franchises"][0], "Halo");

    let installments: Value = ureq::get(&server.url("/api/get_game_installments/Halo"))
        .set("Authorization", &bearer)
        .call()
        .expect("installments")
        .into_json()
        .expect("json");
    assert_eq!(installments["game_installments"][0]["installment_name"], "Infinite");

    // A game with stats cannot be deleted
    let blocked = ureq::delete(&server.url(&format!("/api/delete_game/{game_id}"))).set(
        "Authorization",
        &bearer,
    );
    assert_eq!(status_of(blocked.call()), 409);

    // Deleting the only stat reports the game as emptied
    let deleted: Value = ureq::delete(&server.url("/api/delete_stats/1"))
        .set("Authorization", &bearer)
        .call()
        .expect("delete stat")
        .into_json()
        .expect("json");
    assert_eq!(deleted["last_stat_deleted"], true);
    assert_eq!(deleted["game_id"], game_id);

    // Now the game can go
    let response = ureq::delete(&server.url(&format!("/api/delete_game/{game_id}")))
        .set("Authorization", &bearer)
        .call()
        .expect("delete game");
    assert_eq!(response.status(), 200);
}

#[test]
fn unknown_routes_are_not_found() {
    let server = spawn_server();
    let result = ureq::get(&server.url("/api/nope")).call();
    assert_eq!(status_of(result), 404);
}
