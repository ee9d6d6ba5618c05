//! Configuration file parser for ~/.config/showwatch/config.toml.
//!
//! The config file is optional in the sense that a missing file yields
//! `Config::default()`, but a run still needs `keyword`, `search_url` and
//! `detail_base_url`; [`Config::validate`] checks those.
//!
//! Credentials (`RECIPIENT_EMAIL`, `SLACK_WEB_HOOK_URL`, `MAIL_API_TOKEN`)
//! are looked up through [`CredentialSource`]: environment first, then the
//! `[credentials]` table of the file.
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::filter::{DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A required key is missing or a value is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Show name sent as the search keyword.
    pub keyword: String,

    /// Optional channel filter; unset searches all channels.
    pub channel: Option<String>,

    /// Search endpoint (form POST, JSON response).
    pub search_url: String,

    /// Detail links are this prefix followed by the record id.
    pub detail_base_url: String,

    /// Link back to the episode list, appended to every notification.
    pub collection_url: Option<String>,

    /// Maximum number of search requests per run.
    pub max_pages: u32,

    /// Pause between page requests, in milliseconds.
    pub page_delay_ms: u64,

    /// Days ahead within which an unrecorded episode triggers a reminder.
    pub horizon_days: i64,

    /// How long to wait for the run lock before skipping the run.
    pub lock_timeout_ms: u64,

    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,

    /// Episode database location (default: next to the config file).
    pub database_path: Option<PathBuf>,

    pub email: EmailConfig,

    pub slack: SlackConfig,

    /// Fallback values for credentials not present in the environment.
    pub credentials: HashMap<String, String>,
}

/// Mail relay settings. The recipient comes from `RECIPIENT_EMAIL`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// HTTP mail relay endpoint; unset disables email.
    pub api_url: Option<String>,
    pub subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            subject: "Unrecorded episodes airing soon".to_string(),
        }
    }
}

/// Chat webhook presentation. The webhook URL comes from `SLACK_WEB_HOOK_URL`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: "#general".to_string(),
            username: "showwatch".to_string(),
            icon_emoji: ":tv:".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            channel: None,
            search_url: String::new(),
            detail_base_url: String::new(),
            collection_url: None,
            max_pages: 10,
            page_delay_ms: 1000,
            horizon_days: DEFAULT_HORIZON_DAYS,
            lock_timeout_ms: 1000,
            http_timeout_secs: 30,
            database_path: None,
            email: EmailConfig::default(),
            slack: SlackConfig::default(),
            credentials: HashMap::new(),
        }
    }
}

/// Mask credential values in Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut credential_keys: Vec<_> = self.credentials.keys().collect();
        credential_keys.sort();
        f.debug_struct("Config")
            .field("keyword", &self.keyword)
            .field("channel", &self.channel)
            .field("search_url", &self.search_url)
            .field("detail_base_url", &self.detail_base_url)
            .field("collection_url", &self.collection_url)
            .field("max_pages", &self.max_pages)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("horizon_days", &self.horizon_days)
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("database_path", &self.database_path)
            .field("email", &self.email)
            .field("slack", &self.slack)
            .field(
                "credentials",
                &credential_keys
                    .into_iter()
                    .map(|k| (k, "[REDACTED]"))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 14] = [
        "keyword",
        "channel",
        "search_url",
        "detail_base_url",
        "collection_url",
        "max_pages",
        "page_delay_ms",
        "horizon_days",
        "lock_timeout_ms",
        "http_timeout_secs",
        "database_path",
        "email",
        "slack",
        "credentials",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), keyword = %config.keyword, "Loaded configuration");
        Ok(config)
    }

    /// Check the keys a run cannot do without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyword.trim().is_empty() {
            return Err(ConfigError::Invalid("`keyword` must be set".into()));
        }
        if self.search_url.is_empty() {
            return Err(ConfigError::Invalid("`search_url` must be set".into()));
        }
        if self.detail_base_url.is_empty() {
            return Err(ConfigError::Invalid("`detail_base_url` must be set".into()));
        }
        if !(0..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(ConfigError::Invalid(format!(
                "`horizon_days` must be between 0 and {MAX_HORIZON_DAYS}"
            )));
        }
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Notification recipient address.
pub const RECIPIENT_EMAIL: &str = "RECIPIENT_EMAIL";
/// Chat webhook URL (embeds its own token).
pub const SLACK_WEB_HOOK_URL: &str = "SLACK_WEB_HOOK_URL";
/// Bearer token for the mail relay, if it needs one.
pub const MAIL_API_TOKEN: &str = "MAIL_API_TOKEN";

/// Read-only lookup of named secret strings.
///
/// A missing or empty value is `None`; callers treat that as "channel not
/// configured", never as an error.
pub trait CredentialSource: Send + Sync {
    fn get(&self, name: &str) -> Option<SecretString>;
}

/// Environment variables layered over the config file's `[credentials]`.
pub struct LayeredCredentials {
    env: fn(&str) -> Option<String>,
    file: HashMap<String, String>,
}

impl LayeredCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            env: |name: &str| std::env::var(name).ok(),
            file: config.credentials.clone(),
        }
    }

    /// Layer over a custom lookup instead of the process environment.
    pub fn with_env(env: fn(&str) -> Option<String>, file: HashMap<String, String>) -> Self {
        Self { env, file }
    }
}

impl CredentialSource for LayeredCredentials {
    fn get(&self, name: &str) -> Option<SecretString> {
        (self.env)(name)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                self.file
                    .get(name)
                    .filter(|v| !v.trim().is_empty())
                    .cloned()
            })
            .map(SecretString::from)
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<SecretString> {
        HashMap::get(self, name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
