//! Social posting pipeline
//!
//! After a session is ingested, the pipeline renders a chart (bar for
//! the first session, line afterwards), uploads it, builds a caption,
//! and fires the outbound webhook. Every step is best-effort: a failure
//! downgrades to a log line and never fails stat ingestion.

mod caption;
mod chart;
mod handles;
mod holiday;
mod webhook;

pub use caption::{generate_post_caption, CaptionContext};
pub use chart::{
    ChartKind, ChartRenderer, ChartRequest, ChartUploader, DisabledRenderer, DisabledUploader,
    StatSeries,
};
pub use handles::{game_handle, game_hashtags, PlatformSocial};
pub use holiday::{current_holiday, Holiday};
pub use webhook::WebhookClient;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::SocialConfig;
use crate::store::{GameIdentity, Queries, SessionPoint};

/// A single destination network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Twitter,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
        }
    }
}

/// Destinations resolved from the `platform` config value
fn resolve_targets(platform: &str) -> Vec<Platform> {
    match platform {
        "twitter" => vec![Platform::Twitter],
        "instagram" => vec![Platform::Instagram],
        "both" => vec![Platform::Twitter, Platform::Instagram],
        other => {
            warn!("Unknown social platform '{other}', defaulting to twitter");
            vec![Platform::Twitter]
        }
    }
}

/// What the pipeline did for one ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Posted to every resolved platform
    Posted { image_url: String },
    /// Nothing to do (disabled, no usable stats, or collaborator missing)
    Skipped(String),
}

/// Orchestrates chart, upload, caption, and webhook
pub struct SocialPoster {
    config: SocialConfig,
    renderer: Box<dyn ChartRenderer>,
    uploader: Box<dyn ChartUploader>,
    webhook: WebhookClient,
}

impl SocialPoster {
    /// Poster with disabled chart collaborators: the pipeline skips
    /// until a real renderer/uploader is wired in.
    pub fn new(config: SocialConfig) -> Self {
        Self {
            config,
            renderer: Box::new(DisabledRenderer),
            uploader: Box::new(DisabledUploader),
            webhook: WebhookClient::new(),
        }
    }

    pub fn with_collaborators(
        config: SocialConfig,
        renderer: Box<dyn ChartRenderer>,
        uploader: Box<dyn ChartUploader>,
        webhook: WebhookClient,
    ) -> Self {
        Self {
            config,
            renderer,
            uploader,
            webhook,
        }
    }

    /// Run the pipeline for a freshly ingested session.
    pub fn post_session_update(
        &self,
        queries: &Queries,
        player_id: i64,
        game_id: i64,
        player_name: &str,
        game: &GameIdentity,
        is_live: bool,
        now: DateTime<Utc>,
    ) -> Result<PostOutcome> {
        if !self.config.enabled {
            return Ok(PostOutcome::Skipped("social posting disabled".to_string()));
        }

        let games_played = queries.sessions_played(player_id, game_id)?;
        let top_stats = queries.top_stat_types(game_id, 3)?;
        if top_stats.is_empty() {
            return Ok(PostOutcome::Skipped("no usable stats yet".to_string()));
        }

        // First session gets a bar chart of its values; later sessions a
        // line chart across sessions.
        let kind = if games_played == 1 {
            ChartKind::Bar
        } else {
            ChartKind::Line
        };

        let mut series = Vec::with_capacity(top_stats.len());
        for stat_type in &top_stats {
            let points = match kind {
                ChartKind::Bar => queries
                    .latest_stat_value(player_id, game_id, stat_type)?
                    .map(|value| {
                        vec![SessionPoint {
                            played_at: now.timestamp_millis(),
                            value,
                        }]
                    })
                    .unwrap_or_default(),
                ChartKind::Line => queries.stat_history(player_id, game_id, stat_type)?,
            };
            series.push(StatSeries {
                label: stat_type.clone(),
                points,
            });
        }

        let request = ChartRequest {
            kind,
            player_name: player_name.to_string(),
            game_name: game.game_name.clone(),
            game_installment: game.game_installment.clone(),
            series,
        };

        let image = match self.renderer.render(&request) {
            Ok(image) => image,
            Err(e) => return Ok(PostOutcome::Skipped(format!("chart not rendered: {e}"))),
        };

        let object_name = object_name(player_name, &game.game_name, kind, now);
        let image_url = match self.uploader.upload(&image, &object_name) {
            Ok(url) => url,
            Err(e) => return Ok(PostOutcome::Skipped(format!("chart not uploaded: {e}"))),
        };

        let top_value = queries
            .latest_stat_value(player_id, game_id, &top_stats[0])?
            .unwrap_or(0);
        let today = now.date_naive();

        for platform in resolve_targets(&self.config.platform) {
            let context = CaptionContext {
                game_name: &game.game_name,
                game_installment: game.game_installment.as_deref(),
                top_label: &top_stats[0],
                top_value,
                games_played,
                is_live,
                credit_style: &self.config.credit_style,
                channel_handle: &self.config.channel_handle,
            };
            let caption = generate_post_caption(&context, platform, today);
            self.webhook
                .trigger_post(&self.config, &image_url, &caption, platform)?;
        }

        info!("Social post published for {player_name} / {}", game.game_name);
        Ok(PostOutcome::Posted { image_url })
    }
}

fn object_name(player: &str, game: &str, kind: ChartKind, now: DateTime<Utc>) -> String {
    let slug = |s: &str| s.to_lowercase().replace(' ', "_");
    format!(
        "{}_{}_{}_{}.png",
        slug(player),
        slug(game),
        kind.as_str(),
        now.timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewStat, Recorder, StatStore};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MemoryRenderer {
        requests: Mutex<Vec<ChartRequest>>,
    }

    impl ChartRenderer for MemoryRenderer {
        fn render(&self, request: &ChartRequest) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(vec![0x89, 0x50, 0x4e, 0x47])
        }
    }

    struct MemoryUploader;

    impl ChartUploader for MemoryUploader {
        fn upload(&self, _image: &[u8], object_name: &str) -> Result<String> {
            Ok(format!("https://storage.example.com/{object_name}"))
        }
    }

    fn seed_store() -> (tempfile::TempDir, StatStore, i64, i64, GameIdentity) {
        let dir = tempdir().unwrap();
        let store = StatStore::with_path(&dir.path().join("stats.db")).unwrap();
        let recorder = store.recorder();

        let (user, _) = recorder.ensure_user("a@b.c", true).unwrap();
        let identity = GameIdentity {
            game_name: "Apex Legends".into(),
            ..Default::default()
        };
        let game = recorder.ensure_game(&identity, 1000).unwrap();
        let player = recorder.ensure_player("Wraith", user, 1000).unwrap();
        (dir, store, player, game, identity)
    }

    fn stat(stat_type: &str, value: i64) -> NewStat {
        NewStat {
            stat_type: Some(stat_type.to_string()),
            stat_value: Some(value),
            game_mode: None,
            game_level: None,
            win: None,
            ranked: None,
            pre_match_rank_value: None,
            post_match_rank_value: None,
        }
    }

    fn insert_session(recorder: &Recorder, player: i64, game: i64, value: i64, at: i64) {
        recorder
            .insert_stats(player, game, &[stat("Eliminations", value)], at)
            .unwrap();
    }

    fn webhook_capture() -> (WebhookClient, mpsc::Receiver<String>, std::thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            while let Ok(request) = server.recv() {
                let url = request.url().to_string();
                let done = tx.send(url).is_err();
                let _ = request.respond(tiny_http::Response::from_string("ok"));
                if done {
                    break;
                }
            }
        });
        (
            WebhookClient::with_base_url(format!("http://127.0.0.1:{port}")),
            rx,
            handle,
        )
    }

    #[test]
    fn test_first_session_posts_bar_chart() {
        let (_dir, store, player, game, identity) = seed_store();
        insert_session(&store.recorder(), player, game, 12, 5000);

        let (webhook, rx, _handle) = webhook_capture();
        let renderer = MemoryRenderer {
            requests: Mutex::new(Vec::new()),
        };
        let config = SocialConfig {
            webhook_key: "k".into(),
            ..Default::default()
        };
        let poster = SocialPoster::with_collaborators(
            config,
            Box::new(renderer),
            Box::new(MemoryUploader),
            webhook,
        );

        let outcome = poster
            .post_session_update(
                &store.query(),
                player,
                game,
                "Wraith",
                &identity,
                false,
                Utc::now(),
            )
            .unwrap();

        match outcome {
            PostOutcome::Posted { image_url } => {
                assert!(image_url.contains("wraith_apex_legends_bar"));
            }
            other => panic!("expected post, got {other:?}"),
        }
        let url = rx.recv().unwrap();
        assert!(url.starts_with("/trigger/post_to_twitter/"));
    }

    #[test]
    fn test_later_sessions_post_line_chart() {
        let (_dir, store, player, game, identity) = seed_store();
        let recorder = store.recorder();
        insert_session(&recorder, player, game, 12, 5000);
        insert_session(&recorder, player, game, 20, 9000);

        let (webhook, _rx, _handle) = webhook_capture();
        let config = SocialConfig {
            webhook_key: "k".into(),
            ..Default::default()
        };
        let poster = SocialPoster::with_collaborators(
            config,
            Box::new(MemoryRenderer {
                requests: Mutex::new(Vec::new()),
            }),
            Box::new(MemoryUploader),
            webhook,
        );

        let outcome = poster
            .post_session_update(
                &store.query(),
                player,
                game,
                "Wraith",
                &identity,
                false,
                Utc::now(),
            )
            .unwrap();

        match outcome {
            PostOutcome::Posted { image_url } => assert!(image_url.contains("_line_")),
            other => panic!("expected post, got {other:?}"),
        }
    }

    #[test]
    fn test_both_platforms_fan_out() {
        let (_dir, store, player, game, identity) = seed_store();
        insert_session(&store.recorder(), player, game, 12, 5000);

        let (webhook, rx, _handle) = webhook_capture();
        let config = SocialConfig {
            webhook_key: "k".into(),
            platform: "both".into(),
            ..Default::default()
        };
        let poster = SocialPoster::with_collaborators(
            config,
            Box::new(MemoryRenderer {
                requests: Mutex::new(Vec::new()),
            }),
            Box::new(MemoryUploader),
            webhook,
        );

        poster
            .post_session_update(
                &store.query(),
                player,
                game,
                "Wraith",
                &identity,
                false,
                Utc::now(),
            )
            .unwrap();

        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        assert!(first.contains("post_to_twitter"));
        assert!(second.contains("post_to_instagram"));
    }

    #[test]
    fn test_disabled_renderer_skips_not_fails() {
        let (_dir, store, player, game, identity) = seed_store();
        insert_session(&store.recorder(), player, game, 12, 5000);

        let poster = SocialPoster::new(SocialConfig {
            webhook_key: "k".into(),
            ..Default::default()
        });

        let outcome = poster
            .post_session_update(
                &store.query(),
                player,
                game,
                "Wraith",
                &identity,
                false,
                Utc::now(),
            )
            .unwrap();
        assert!(matches!(outcome, PostOutcome::Skipped(_)));
    }

    #[test]
    fn test_no_stats_skips() {
        let (_dir, store, player, game, identity) = seed_store();

        let poster = SocialPoster::new(SocialConfig::default());
        let outcome = poster
            .post_session_update(
                &store.query(),
                player,
                game,
                "Wraith",
                &identity,
                false,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(
            outcome,
            PostOutcome::Skipped("no usable stats yet".to_string())
        );
    }

    #[test]
    fn test_resolve_targets() {
        assert_eq!(resolve_targets("twitter"), vec![Platform::Twitter]);
        assert_eq!(
            resolve_targets("both"),
            vec![Platform::Twitter, Platform::Instagram]
        );
        assert_eq!(resolve_targets("mastodon"), vec![Platform::Twitter]);
    }
}
