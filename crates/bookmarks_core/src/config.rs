//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold tunables for pagination and logging.
//! - Load and validate them from JSON documents supplied by the host.
//!
//! # Invariants
//! - `0 < default_page_size <= max_page_size` for every validated config.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Users per page when a page is requested without an explicit size.
    pub default_page_size: u32,
    /// Upper bound applied to requested page sizes.
    pub max_page_size: u32,
    /// Log level passed to `init_logging` by hosts that use it.
    pub log_level: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            log_level: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(value: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(value).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if let Some(level) = self.log_level.as_deref() {
            if !matches!(
                level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "warning" | "error"
            ) {
                return Err(ConfigError::Invalid(format!(
                    "unsupported log level `{level}`"
                )));
            }
        }
        Ok(())
    }
}
