//! Core configuration.
//!
//! # Responsibility
//! - Deserialize runtime settings from JSON with per-field defaults.
//! - Reject settings that would break listing or notification behavior.
//!
//! # Invariants
//! - A validated config always has `min_per_page <= default_per_page <= max_per_page`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_SITE_URL: &str = "https://pkghub.example.org";
const DEFAULT_MAIL_FROM: &str = "notify@pkghub.example.org";
const DEFAULT_REPLY_TO: &str = "noreply@pkghub.example.org";

/// Top-level configuration for the moderation core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Base URL used for links in outgoing mail.
    pub site_url: String,
    pub mail: MailConfig,
    pub search: SearchConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Headers of outgoing notification mail.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub reply_to: String,
}

/// Paging bounds of the package listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_per_page: i64,
    pub min_per_page: i64,
    pub max_per_page: i64,
    /// Page markers shown on each side of the current page.
    pub page_window: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a session stays valid after its last update.
    pub ttl_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `None` picks the build-mode default.
    pub level: Option<String>,
    /// Absolute log directory. `None` leaves logging to the host.
    pub dir: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            mail: MailConfig::default(),
            search: SearchConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: DEFAULT_MAIL_FROM.to_string(),
            reply_to: DEFAULT_REPLY_TO.to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: 50,
            min_per_page: 50,
            max_per_page: 250,
            page_window: 5,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 7200 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_url.trim().is_empty() {
            return Err(ConfigError::Invalid("site_url must not be blank".to_string()));
        }

        let search = &self.search;
        if search.min_per_page <= 0 || search.min_per_page > search.max_per_page {
            return Err(ConfigError::Invalid(format!(
                "search page bounds [{}, {}] are not a valid range",
                search.min_per_page, search.max_per_page
            )));
        }
        if !(search.min_per_page..=search.max_per_page).contains(&search.default_per_page) {
            return Err(ConfigError::Invalid(format!(
                "search.default_per_page {} is outside [{}, {}]",
                search.default_per_page, search.min_per_page, search.max_per_page
            )));
        }
        if search.page_window <= 0 {
            return Err(ConfigError::Invalid(
                "search.page_window must be positive".to_string(),
            ));
        }
        if self.session.ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "session.ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
