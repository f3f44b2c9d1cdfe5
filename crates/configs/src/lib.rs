//! # configs
//!
//! Layered settings for the message board.
//!
//! Sources, later ones winning:
//! 1. built-in defaults (`Default` impls below)
//! 2. an optional TOML file (`config/message-board.toml` unless overridden)
//! 3. `.env` entries, loaded into the process environment by `dotenvy`
//! 4. environment variables `MSGBOARD__<SECTION>__<KEY>`, e.g.
//!    `MSGBOARD__STORAGE__BACKEND=postgres`

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "MSGBOARD";
pub const DEFAULT_CONFIG_FILE: &str = "config/message-board.toml";
/// Largest listing size a `board` default may configure; matches the cap
/// the services put on caller-supplied limits.
pub const MAX_LISTING_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub board: BoardSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory served for non-API paths; `None` disables static files
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// Shared tables partitioned by board name
    Shared,
    /// One container per board
    Container,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub layout: StorageLayout,
    #[serde(deserialize_with = "deserialize_secret")]
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
    /// Upper bound for every individual store call
    pub call_timeout_ms: u64,
    /// Memory backend only: stage multi-step writes atomically
    pub transactions: bool,
}

impl StorageSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            layout: StorageLayout::Shared,
            database_url: None,
            max_connections: 10,
            call_timeout_ms: 5_000,
            transactions: true,
        }
    }
}

/// What happens to a thread's replies when the thread is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadDeletePolicy {
    /// Replies stay behind, still referencing the deleted thread
    Orphan,
    /// Replies are deleted together with the thread
    Cascade,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    /// Threads returned by a board listing
    pub thread_limit: usize,
    /// Replies attached to each thread in a board listing
    pub reply_preview_limit: usize,
    /// Replies returned by a thread's reply listing
    pub reply_limit: usize,
    /// Concurrent reply lookups while building a board listing
    pub fan_out_concurrency: usize,
    pub thread_delete_policy: ThreadDeletePolicy,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            thread_limit: 10,
            reply_preview_limit: 3,
            reply_limit: 10,
            fan_out_concurrency: 10,
            thread_delete_policy: ThreadDeletePolicy::Orphan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Loads `.env`, the default config file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Same as [`Settings::load`] without touching `.env`; the file is optional.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects combinations no adapter can serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.storage;
        if storage.backend == StorageBackend::Postgres {
            if storage.database_url.is_none() {
                return Err(ConfigError::Invalid(
                    "storage.database_url is required for the postgres backend".into(),
                ));
            }
            if storage.layout == StorageLayout::Container {
                return Err(ConfigError::Invalid(
                    "the postgres backend only supports the shared layout".into(),
                ));
            }
        }
        if storage.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("storage.call_timeout_ms must be positive".into()));
        }

        let board = &self.board;
        if board.fan_out_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "board.fan_out_concurrency must be positive".into(),
            ));
        }
        for (name, value) in [
            ("board.thread_limit", board.thread_limit),
            ("board.reply_preview_limit", board.reply_preview_limit),
            ("board.reply_limit", board.reply_limit),
        ] {
            if !(1..=MAX_LISTING_LIMIT).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 1 and {MAX_LISTING_LIMIT}"
                )));
            }
        }
        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::new(s.into_boxed_str())))
}
