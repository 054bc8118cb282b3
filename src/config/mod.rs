//! Configuration module for the rename bot.
//!
//! Loads configuration from environment variables. Parsing goes through a
//! lookup function so the same code serves both the real environment and
//! tests.

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default upload ceiling: 5 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Longest accepted rate-limit window: one week.
pub const MAX_RATE_LIMIT_WINDOW: u64 = 7 * 24 * 60 * 60;

/// Bot running mode
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("WEBHOOK_URL must be set when USE_WEBHOOK is enabled")]
    WebhookUrlRequired,

    #[error("DEFAULT_FORMAT is not a valid template: {0}")]
    DefaultFormat(String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    /// Public base URL; updates arrive on `<base>/webhook`.
    pub webhook_url: Option<Url>,
    pub webhook_secret: Option<String>,
    pub port: u16,
    /// Custom Bot API server (required for files above 20 MB).
    pub bot_api_url: Option<Url>,

    /// Owner user IDs. These users have full access to all bot features.
    pub owner_ids: Vec<u64>,

    // Files
    pub max_file_size: u64,
    pub download_path: PathBuf,
    pub temp_path: PathBuf,
    pub default_format: String,
    pub max_concurrent_jobs: usize,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub welcome_image: Option<PathBuf>,

    // Storage
    pub database_path: PathBuf,

    // Limits
    pub rate_limit_requests: u32,
    pub rate_limit_window: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let bot_mode = match get("USE_WEBHOOK").map(|v| v.to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = get("WEBHOOK_URL")
            .map(|raw| parse_url("WEBHOOK_URL", raw))
            .transpose()?;

        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::WebhookUrlRequired);
        }

        let bot_api_url = get("BOT_API_URL")
            .map(|raw| parse_url("BOT_API_URL", raw))
            .transpose()?;

        let owner_ids = match get("OWNER_ID") {
            Some(raw) => parse_owner_ids(&raw)?,
            None => Vec::new(),
        };

        let default_format = get("DEFAULT_FORMAT").unwrap_or_else(|| "{title}".to_string());
        crate::template::validate(&default_format)
            .map_err(|e| ConfigError::DefaultFormat(e.to_string()))?;

        let max_concurrent_jobs: usize = parse_or("MAX_CONCURRENT_JOBS", get("MAX_CONCURRENT_JOBS"), 3)?;

        let rate_limit_requests: u32 = parse_in_range(
            "RATE_LIMIT_REQUESTS",
            get("RATE_LIMIT_REQUESTS"),
            5,
            1..=u32::MAX,
        )?;
        let rate_limit_window: u64 = parse_in_range(
            "RATE_LIMIT_WINDOW",
            get("RATE_LIMIT_WINDOW"),
            60,
            1..=MAX_RATE_LIMIT_WINDOW,
        )?;

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_secret: get("WEBHOOK_SECRET"),
            port: parse_or("PORT", get("PORT"), 5000)?,
            bot_api_url,
            owner_ids,
            max_file_size: parse_or("MAX_FILE_SIZE", get("MAX_FILE_SIZE"), DEFAULT_MAX_FILE_SIZE)?,
            download_path: get("DOWNLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            temp_path: get("TEMP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./temp")),
            default_format,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            ffmpeg_path: get("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: get("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            welcome_image: get("WELCOME_IMAGE").map(PathBuf::from),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("bot_data.db")),
            rate_limit_requests,
            rate_limit_window,
            log_level: get("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Check if a user is a bot owner.
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }

    /// Full webhook endpoint, `<WEBHOOK_URL>/webhook`.
    pub fn webhook_endpoint(&self) -> Option<Url> {
        let base = self.webhook_url.as_ref()?;
        let joined = format!("{}/webhook", base.as_str().trim_end_matches('/'));
        Url::parse(&joined).ok()
    }

    /// Default tracing directive derived from `LOG_LEVEL`.
    pub fn log_directive(&self) -> String {
        format!("autorename={},teloxide=warn", self.log_level)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but values outside `range` are rejected too.
fn parse_in_range<T>(
    key: &'static str,
    raw: Option<String>,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd,
{
    let value = parse_or(key, raw.clone(), default)?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(value)
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_owner_ids(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "OWNER_ID",
                value: s.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("BOT_TOKEN", "123:abc")]).unwrap();

        assert_eq!(config.bot_mode, BotMode::Polling);
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.default_format, "{title}");
        assert_eq!(config.rate_limit_requests, 5);
        assert_eq!(config.rate_limit_window, 60);
        assert_eq!(config.database_path, PathBuf::from("bot_data.db"));
        assert!(config.owner_ids.is_empty());
        assert_eq!(config.log_directive(), "autorename=info,teloxide=warn");
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn test_webhook_requires_url() {
        let err = load(&[("BOT_TOKEN", "t"), ("USE_WEBHOOK", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::WebhookUrlRequired);

        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("USE_WEBHOOK", "true"),
            ("WEBHOOK_URL", "https://bot.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.bot_mode, BotMode::Webhook);
        assert_eq!(
            config.webhook_endpoint().unwrap().as_str(),
            "https://bot.example.com/webhook"
        );
    }

    #[test]
    fn test_owner_list() {
        let config = load(&[("BOT_TOKEN", "t"), ("OWNER_ID", "42, 7")]).unwrap();
        assert!(config.is_owner(42));
        assert!(config.is_owner(7));
        assert!(!config.is_owner(1));
    }

    #[test]
    fn test_malformed_number_is_error() {
        let err = load(&[("BOT_TOKEN", "t"), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid { key: "PORT", value: "eighty".to_string() }
        );
    }

    #[test]
    fn test_rate_limit_bounds() {
        for (key, value) in [
            ("RATE_LIMIT_REQUESTS", "0"),
            ("RATE_LIMIT_WINDOW", "0"),
            ("RATE_LIMIT_WINDOW", "604801"),
            ("RATE_LIMIT_WINDOW", "18446744073709551615"),
        ] {
            let err = load(&[("BOT_TOKEN", "t"), (key, value)]).unwrap_err();
            assert_eq!(err, ConfigError::Invalid { key, value: value.to_string() });
        }

        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("RATE_LIMIT_REQUESTS", "1"),
            ("RATE_LIMIT_WINDOW", "604800"),
        ])
        .unwrap();
        assert_eq!(config.rate_limit_requests, 1);
        assert_eq!(config.rate_limit_window, MAX_RATE_LIMIT_WINDOW);
    }

    #[test]
    fn test_bad_default_format() {
        let err = load(&[("BOT_TOKEN", "t"), ("DEFAULT_FORMAT", "{nope}")]).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultFormat(_)));
    }
}
