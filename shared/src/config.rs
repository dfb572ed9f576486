use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::{AppError, ErrorKind};
use crate::{
    DEFAULT_ENDPOINT, DEFAULT_FIELD_NAME, DEFAULT_TIMEOUT_MS, MAX_IMAGE_BYTES, MAX_TIMEOUT_MS,
    MIN_TIMEOUT_MS,
};

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_FIELD_NAME_LENGTH: usize = 64;

pub const ENV_ENDPOINT: &str = "LEAFSCAN_ENDPOINT";
pub const ENV_FIELD_NAME: &str = "LEAFSCAN_FIELD_NAME";
pub const ENV_TIMEOUT_MS: &str = "LEAFSCAN_TIMEOUT_MS";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("invalid multipart field name '{0}'")]
    InvalidFieldName(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::InvalidConfig, e.to_string())
    }
}

/// Classification endpoint, checked once when configuration is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl(String);

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            url: truncate_url(&url),
            reason: reason.to_string(),
        };

        if url.trim().is_empty() {
            return Err(invalid("URL cannot be empty"));
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(invalid("URL is too long"));
        }

        let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(invalid(&format!(
                    "invalid scheme '{other}', only 'http' and 'https' are allowed"
                )))
            }
        }

        if parsed.host_str().is_none() {
            return Err(invalid("URL must have a host"));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials in URL are not allowed"));
        }

        Ok(Self(parsed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() <= 100 {
        url.to_string()
    } else {
        let head: String = url.chars().take(100).collect();
        format!("{head}...")
    }
}

/// Client-side settings for the classification round-trip.
///
/// The field name and endpoint are a contract with the external service;
/// the defaults match the `/detect` service the app ships against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub field_name: String,
    pub timeout_ms: u64,
    pub max_image_bytes: usize,
    /// Start detection as soon as a file is accepted.
    pub auto_detect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_image_bytes: MAX_IMAGE_BYTES,
            auto_detect: true,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    /// Normalizes the endpoint, clamps the timeout and size limit, and rejects
    /// anything the classifier request could not be built from.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let endpoint = ValidatedUrl::new(self.endpoint)?;

        let field_name = self.field_name.trim().to_string();
        if field_name.is_empty()
            || field_name.len() > MAX_FIELD_NAME_LENGTH
            || !field_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidFieldName(field_name));
        }

        Ok(Self {
            endpoint: endpoint.as_str().to_string(),
            field_name,
            timeout_ms: self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
            max_image_bytes: self.max_image_bytes.clamp(1, MAX_IMAGE_BYTES),
            auto_detect: self.auto_detect,
        })
    }

    /// Builds a configuration from `LEAFSCAN_*` variables looked up through
    /// `lookup`, falling back to defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(field_name) = lookup(ENV_FIELD_NAME) {
            config.field_name = field_name;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms =
                timeout
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_TIMEOUT_MS,
                        value: timeout.clone(),
                    })?;
        }

        config.validated()
    }
}
