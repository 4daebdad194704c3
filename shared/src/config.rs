use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::{Region, ValidationError};
use crate::{AppError, ErrorKind, DEFAULT_HOME_REGION};

pub const MAX_URL_LENGTH: usize = 2048;
pub const DEFAULT_SESSION_KEY: &str = "jwt_token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API base '{url}': {reason}")]
    InvalidApiBase { url: String, reason: String },

    #[error("invalid home region: {0}")]
    InvalidRegion(#[from] ValidationError),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

/// Settings handed over by the shell on startup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StartupConfig {
    pub api_base: String,
    #[serde(default)]
    pub home_region: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Validated runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    api_base: Url,
    home_region: Region,
    session_key: String,
}

impl AppConfig {
    pub fn new(api_base: &str, home_region: Region) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: Self::validate_api_base(api_base)?,
            home_region,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        })
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    #[must_use]
    pub fn home_region(&self) -> &Region {
        &self.home_region
    }

    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    fn validate_api_base(raw: &str) -> Result<Url, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidApiBase {
            url: raw.chars().take(100).collect(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("URL cannot be empty"));
        }
        if trimmed.len() > MAX_URL_LENGTH {
            return Err(invalid("URL is too long"));
        }

        // Url::join drops the last segment unless the base ends in '/'.
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        let parsed = Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        }
        if parsed.host_str().is_none() {
            return Err(invalid("URL must have a host"));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("URL must not embed credentials"));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("URL must not carry a query or fragment"));
        }

        Ok(parsed)
    }
}

impl TryFrom<StartupConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(startup: StartupConfig) -> Result<Self, Self::Error> {
        let home_region = Region::new(
            startup
                .home_region
                .unwrap_or_else(|| DEFAULT_HOME_REGION.to_string()),
        )?;
        let mut config = Self::new(&startup.api_base, home_region)?;
        if let Some(key) = startup.session_key.filter(|k| !k.trim().is_empty()) {
            config.session_key = key;
        }
        Ok(config)
    }
}
