//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files)
//! and defines the bot's tunable constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Telegram's hard limit for a single text message.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4096;
/// Largest photo accepted for analysis (20MB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;
/// Requests allowed per user inside one rate-limit window.
pub const DEFAULT_RATE_LIMIT_MESSAGES: usize = 10;
/// Rate-limit window length in seconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Port used by the status server when `WEBHOOK_PORT` is unset.
pub const DEFAULT_WEBHOOK_PORT: u16 = 5000;

/// Number of turns kept per user.
pub const HISTORY_CAPACITY: usize = 20;
/// Number of most recent turns sent to the model in multi-turn mode.
pub const CONTEXT_TURNS: usize = 10;

/// MIME types accepted for image analysis
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Gemini model used for chat
pub const GEMINI_TEXT_MODEL: &str = "gemini-2.5-flash";
/// Gemini model used for image analysis
pub const GEMINI_VISION_MODEL: &str = "gemini-2.5-pro";
/// Gemini model used for image generation
pub const GEMINI_IMAGE_GEN_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Longest image edge (pixels) sent to the vision model
pub const IMAGE_MAX_EDGE: u32 = 1920;
/// JPEG quality used when re-encoding preprocessed images
pub const IMAGE_JPEG_QUALITY: u8 = 85;

/// Default LLM HTTP timeout in seconds
pub const LLM_HTTP_TIMEOUT_SECS: u64 = 30;

/// Get the LLM HTTP timeout from env or default.
///
/// Environment variable: `LLM_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    std::env::var("LLM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LLM_HTTP_TIMEOUT_SECS)
}

/// Get the log level used when `RUST_LOG` is not set.
///
/// Environment variable: `LOG_LEVEL`.
#[must_use]
pub fn get_log_level() -> String {
    std::env::var("LOG_LEVEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map_or_else(default_log_level, |s| s.to_lowercase())
}

/// Errors raised when the loaded settings are unusable
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or deserialize configuration sources
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Required variables are absent or empty
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_bot_token: String,
    /// Gemini API key
    #[serde(default)]
    pub gemini_api_key: String,
    /// Telegram user ID of the administrator
    #[serde(default)]
    pub admin_id: i64,

    /// Public webhook URL, if one is configured
    pub webhook_url: Option<String>,
    /// Port of the status server
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    /// Bot username shown on the status surface
    #[serde(default = "default_bot_username")]
    pub bot_username: String,

    /// Maximum length of an outgoing message
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Maximum accepted photo size in bytes
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,
    /// Requests allowed per window
    #[serde(default = "default_rate_limit_messages")]
    pub rate_limit_messages: usize,
    /// Window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: u64,

    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

const fn default_webhook_port() -> u16 {
    DEFAULT_WEBHOOK_PORT
}

fn default_bot_username() -> String {
    "GeminiAIBot".to_string()
}

const fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

const fn default_max_image_size() -> u64 {
    DEFAULT_MAX_IMAGE_SIZE
}

const fn default_rate_limit_messages() -> usize {
    DEFAULT_RATE_LIMIT_MESSAGES
}

const fn default_rate_limit_window() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            gemini_api_key: String::new(),
            admin_id: 0,
            webhook_url: None,
            webhook_port: default_webhook_port(),
            bot_username: default_bot_username(),
            max_message_length: default_max_message_length(),
            max_image_size: default_max_image_size(),
            rate_limit_messages: default_rate_limit_messages(),
            rate_limit_window: default_rate_limit_window(),
            log_level: default_log_level(),
        }
    }
}

/// Public bot description served by the status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BotInfo {
    /// Bot username
    pub bot_username: String,
    /// Whether a webhook URL is configured
    pub webhook_configured: bool,
    /// Administrator ID
    pub admin_id: i64,
    /// Maximum outgoing message length
    pub max_message_length: usize,
    /// Accepted image MIME types
    pub allowed_image_types: Vec<&'static str>,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg. `APP__WEBHOOK_PORT=8080`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain variables; UPPER_SNAKE_CASE maps to snake_case keys
            .add_source(
                Environment::default()
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load settings and reject them if a required variable is missing.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Config` when sources cannot be read and
    /// `SettingsError::Missing` when validation fails.
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Self::new()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the token, API key and admin ID are present.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Missing` listing every absent variable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut missing = Vec::new();
        if self.telegram_bot_token.trim().is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.gemini_api_key.trim().is_empty() {
            missing.push("GEMINI_API_KEY");
        }
        if self.admin_id == 0 {
            missing.push("ADMIN_ID");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Missing(missing))
        }
    }

    /// Rate-limit window as a `Duration`
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window)
    }

    /// Whether `user_id` is the configured administrator
    #[must_use]
    pub const fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id != 0 && user_id == self.admin_id
    }

    /// Bot information for the status endpoint
    #[must_use]
    pub fn bot_info(&self) -> BotInfo {
        BotInfo {
            bot_username: self.bot_username.clone(),
            webhook_configured: self.webhook_url.as_deref().is_some_and(|u| !u.is_empty()),
            admin_id: self.admin_id,
            max_message_length: self.max_message_length,
            allowed_image_types: ALLOWED_IMAGE_TYPES.to_vec(),
        }
    }
}
