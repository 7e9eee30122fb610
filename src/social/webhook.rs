//! IFTTT maker-webhook client
//!
//! Posts the standard three-value payload (image URL, caption, platform
//! tag) to the configured event. Timeouts are short; a webhook failure
//! is the caller's problem to log, never to retry.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;

use super::Platform;
use crate::config::SocialConfig;

const DEFAULT_BASE_URL: &str = "https://maker.ifttt.com";

/// Client for triggering IFTTT maker events
#[derive(Clone)]
pub struct WebhookClient {
    base_url: String,
    agent: ureq::Agent,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(10))
            .build();

        Self {
            base_url: base_url.into(),
            agent,
        }
    }

    /// Trigger the post event for one platform.
    pub fn trigger_post(
        &self,
        config: &SocialConfig,
        image_url: &str,
        caption: &str,
        platform: Platform,
    ) -> Result<()> {
        if config.webhook_key.is_empty() {
            bail!("webhook key not configured");
        }

        let event = match platform {
            Platform::Twitter => &config.event_twitter,
            Platform::Instagram => &config.event_instagram,
        };

        let url = format!(
            "{}/trigger/{}/with/key/{}",
            self.base_url, event, config.webhook_key
        );

        self.agent
            .post(&url)
            .send_json(json!({
                "value1": image_url,
                "value2": caption,
                "value3": platform.as_str(),
            }))
            .with_context(|| format!("Failed to trigger webhook event '{event}'"))?;

        info!("Webhook triggered for {} (event: {event})", platform.as_str());
        Ok(())
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn test_config() -> SocialConfig {
        SocialConfig {
            webhook_key: "test-key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_trigger_posts_three_value_payload() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut body = String::new();
            use std::io::Read;
            request.as_reader().read_to_string(&mut body).unwrap();
            tx.send((request.url().to_string(), body)).unwrap();
            request
                .respond(tiny_http::Response::from_string("Congratulations!"))
                .unwrap();
        });

        let client = WebhookClient::with_base_url(format!("http://127.0.0.1:{port}"));
        client
            .trigger_post(
                &test_config(),
                "https://example.com/chart.png",
                "caption text",
                Platform::Twitter,
            )
            .unwrap();

        let (url, body) = rx.recv().unwrap();
        assert_eq!(url, "/trigger/post_to_twitter/with/key/test-key");
        let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(payload["value1"], "https://example.com/chart.png");
        assert_eq!(payload["value2"], "caption text");
        assert_eq!(payload["value3"], "twitter");

        handle.join().unwrap();
    }

    #[test]
    fn test_missing_key_refused_without_network() {
        let client = WebhookClient::with_base_url("http://127.0.0.1:9");
        let config = SocialConfig::default();
        let err = client
            .trigger_post(&config, "url", "caption", Platform::Instagram)
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
