//! Configuration file parser for `feedbridge.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source feed to republish.
    pub feed_url: String,

    /// Published feed. Also the baseline the next run diffs against.
    pub output_path: PathBuf,

    /// Where the commit title and body are written when episodes change.
    pub commit_message_path: PathBuf,

    /// Environment variable naming the CI step-summary file. Nothing is
    /// written there when the variable is unset or empty.
    pub step_summary_env: String,

    /// Bound on the whole feed download, in seconds.
    pub request_timeout_secs: u64,

    /// `User-Agent` header sent with the feed request.
    pub user_agent: String,

    /// Values for the Spotify elements added to the feed.
    pub platform: PlatformConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://feed.podbean.com/enachmanson/feed.xml".to_string(),
            output_path: PathBuf::from("feed.xml"),
            commit_message_path: PathBuf::from("commit_msg.txt"),
            step_summary_env: "GITHUB_STEP_SUMMARY".to_string(),
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
            platform: PlatformConfig::default(),
        }
    }
}

/// Channel-level values required by Spotify for Podcasters.
///
/// Custom Debug impl masks `email` so contact addresses stay out of CI logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Owner contact for `spotify:email`. Empty means the element is not added.
    pub email: String,

    /// Number of episodes Spotify fetches, for `spotify:limit`.
    pub limit: u32,

    /// Two-letter country code for `spotify:countryOfOrigin`.
    pub country_of_origin: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            limit: 100,
            country_of_origin: "il".to_string(),
        }
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field(
                "email",
                &(!self.email.is_empty()).then_some("[REDACTED]"),
            )
            .field("limit", &self.limit)
            .field("country_of_origin", &self.country_of_origin)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "feed_url",
        "output_path",
        "commit_message_path",
        "step_summary_env",
        "request_timeout_secs",
        "user_agent",
        "platform",
    ];

    const KNOWN_PLATFORM_KEYS: [&'static str; 3] = ["email", "limit", "country_of_origin"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
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
                // Race condition: file deleted between metadata and read
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
            warn_unknown_keys(&raw, &Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(platform)) = raw.get("platform") {
                warn_unknown_keys(platform, &Self::KNOWN_PLATFORM_KEYS, "platform.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), feed_url = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves the step-summary file from the environment variable named by
    /// `step_summary_env`.
    pub fn step_summary_path(&self) -> Option<PathBuf> {
        if self.step_summary_env.is_empty() {
            return None;
        }
        std::env::var_os(&self.step_summary_env)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
