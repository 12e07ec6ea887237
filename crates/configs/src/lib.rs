//! # configs
//!
//! Layered settings for the Kashaaf server.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `kashaaf.toml` in the working directory (optional), or the file named by `KASHAAF_CONFIG`
//! 3. environment variables `KASHAAF__<SECTION>__<KEY>` (a `.env` file is loaded first)

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server:   ServerSettings,
    pub backend:  BackendKind,
    #[serde(default)]
    pub supabase: Option<SupabaseSettings>,
    pub auth:     AuthSettings,
    #[serde(default)]
    pub gemini:   Option<GeminiSettings>,
    pub feed:     FeedSettings,
    pub analysis: AnalysisSettings,
    pub stats:    StatsSettings,
    pub log:      LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host:           String,
    pub port:           u16,
    /// Upper bound on request bodies; uploads are the large ones.
    pub body_limit_mb:  usize,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }
}

/// Which adapters the binary wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted Supabase project (REST, GoTrue, Storage)
    Supabase,
    /// Process-local maps; data is lost on restart
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    pub url:              String,
    pub anon_key:         SecretString,
    pub service_role_key: SecretString,
    #[serde(default = "default_supabase_timeout")]
    pub timeout_secs:     u64,
}

impl SupabaseSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 secret the auth service signs access tokens with.
    pub jwt_secret:        SecretString,
    /// Lifetime of tokens issued by the in-memory auth backend.
    pub token_ttl_secs:    i64,
}

/// Present only when a Gemini api key is configured; the other keys default.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key:      SecretString,
    #[serde(default = "default_gemini_model")]
    pub model:        String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url:     String,
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl GeminiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub page_size:  usize,
    pub max_items:  usize,
    pub max_videos: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    pub max_frames: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsSettings {
    pub poll_interval_secs: u64,
}

impl StatsSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` overrides it when set.
    pub filter: String,
}

fn default_supabase_timeout() -> u64 {
    30
}

fn default_gemini_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_timeout() -> u64 {
    120
}

const DEFAULTS: &str = r#"
backend = "supabase"

[server]
host = "0.0.0.0"
port = 8080
body_limit_mb = 256

[auth]
token_ttl_secs = 3600

[feed]
page_size = 50
max_items = 4
max_videos = 2

[analysis]
max_frames = 16

[stats]
poll_interval_secs = 15

[log]
format = "json"
filter = "info,tower_http=info"
"#;

impl Settings {
    /// Loads `.env`, the optional config file and the environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env file loaded");
        }
        let file = std::env::var("KASHAAF_CONFIG").unwrap_or_else(|_| "kashaaf.toml".to_string());

        let settings: Settings = Self::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("KASHAAF")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with a TOML document. No file or environment lookup.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Self::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Supabase && self.supabase.is_none() {
            return Err(ConfigError::Invalid(
                "backend = \"supabase\" requires a [supabase] section".into(),
            ));
        }
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.feed.max_videos > self.feed.max_items {
            return Err(ConfigError::Invalid(
                "feed.max_videos cannot exceed feed.max_items".into(),
            ));
        }
        if self.analysis.max_frames == 0 {
            return Err(ConfigError::Invalid("analysis.max_frames must be at least 1".into()));
        }
        if self.stats.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("stats.poll_interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}
