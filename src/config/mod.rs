//! Configuration loading and management

mod secret;

pub use secret::generate_secret;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub social: SocialConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. Defaults to `~/.statline/stats.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Number of pooled connections. Requests beyond this queue.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

/// Authentication settings
///
/// All secrets can be overridden from the environment
/// (`STATLINE_API_KEY`, `STATLINE_JWT_SECRET`, `STATLINE_DASHBOARD_KEY`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static key for login and user administration (`X-API-KEY` header).
    #[serde(default)]
    pub api_key: String,

    /// HS256 signing secret for session tokens.
    #[serde(default)]
    pub jwt_secret: String,

    /// Shared secret for the overlay endpoints (`?key=` query parameter).
    #[serde(default)]
    pub dashboard_key: String,

    /// Emails that are marked trusted on login.
    #[serde(default)]
    pub trusted_emails: Vec<String>,
}

/// Social posting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Run the post pipeline after each stat ingestion.
    #[serde(default = "default_social_enabled")]
    pub enabled: bool,

    /// "twitter", "instagram", or "both".
    #[serde(default = "default_platform")]
    pub platform: String,

    /// IFTTT maker webhook key. Env override: `STATLINE_WEBHOOK_KEY`.
    #[serde(default)]
    pub webhook_key: String,

    #[serde(default = "default_event_twitter")]
    pub event_twitter: String,

    #[serde(default = "default_event_instagram")]
    pub event_instagram: String,

    /// Channel handle appended to captions (twitch.tv/<handle>).
    #[serde(default)]
    pub channel_handle: String,

    /// How captions credit the game: shoutout, credit, props, playing,
    /// respect, vibes, powered, courtesy, ft, brought.
    #[serde(default = "default_credit_style")]
    pub credit_style: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_pool_size() -> usize {
    3
}

fn default_social_enabled() -> bool {
    true
}

fn default_platform() -> String {
    "twitter".to_string()
}

fn default_event_twitter() -> String {
    "post_to_twitter".to_string()
}

fn default_event_instagram() -> String {
    "post_to_instagram".to_string()
}

fn default_credit_style() -> String {
    "shoutout".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: default_pool_size(),
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            enabled: default_social_enabled(),
            platform: default_platform(),
            webhook_key: String::new(),
            event_twitter: default_event_twitter(),
            event_instagram: default_event_instagram(),
            channel_handle: String::new(),
            credit_style: default_credit_style(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a directory
    /// Looks for: .statline/config.toml (preferred) or statline.toml (legacy)
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let new_path = dir.join(".statline/config.toml");
        if new_path.exists() {
            return Self::from_file(&new_path);
        }

        let legacy_path = dir.join("statline.toml");
        if legacy_path.exists() {
            return Self::from_file(&legacy_path);
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Create a config with freshly generated secrets (used by `init`)
    pub fn with_generated_secrets() -> Self {
        let mut config = Self::default();
        config.auth.api_key = generate_secret();
        config.auth.jwt_secret = generate_secret();
        config.auth.dashboard_key = generate_secret();
        config
    }

    /// Environment variables win over file values for secrets
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STATLINE_API_KEY") {
            self.auth.api_key = v;
        }
        if let Ok(v) = std::env::var("STATLINE_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("STATLINE_DASHBOARD_KEY") {
            self.auth.dashboard_key = v;
        }
        if let Ok(v) = std::env::var("STATLINE_WEBHOOK_KEY") {
            self.social.webhook_key = v;
        }
    }

    /// Resolved database path: config value or `~/.statline/stats.db`
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::global_data_dir().join("stats.db"))
    }

    /// Global data directory (~/.statline)
    pub fn global_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".statline")
    }

    pub fn is_trusted_email(&self, email: &str) -> bool {
        self.auth.trusted_emails.iter().any(|e| e == email)
    }
}
