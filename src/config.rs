//! Tap configuration
//!
//! The configuration surface mirrors what the Mailchimp API needs: the
//! account-specific `server` prefix and an API key. Everything else is a
//! tunable with a sensible default.

use crate::error::{Error, Result};
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};

/// Default URL of the published Mailchimp OpenAPI (Swagger 2.0) document
pub const DEFAULT_SPEC_URL: &str = "https://api.mailchimp.com/schema/3.0/Swagger.json?expand";

/// Basic-auth username; Mailchimp ignores it, only the API key matters
pub const BASIC_AUTH_USERNAME: &str = "anystring";

/// Complete tap configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Server prefix used to build the base URL, e.g. "us19" in
    /// `https://us19.api.mailchimp.com/3.0`. Visible in the account URL.
    pub server: String,

    /// API key granting access to the Mailchimp account
    pub api_key: String,

    /// Records requested per page; also the pagination continuation signal
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Override for the OpenAPI document URL
    #[serde(default = "default_spec_url")]
    pub spec_url: String,

    /// Override for the computed API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,
}

fn default_page_size() -> u32 {
    1000
}

fn default_spec_url() -> String {
    DEFAULT_SPEC_URL.to_string()
}

impl TapConfig {
    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TapConfig = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::missing_field("server"));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::missing_field("api_key"));
        }
        if self.page_size == 0 {
            return Err(Error::config("page_size must be greater than zero"));
        }
        Ok(())
    }

    /// API base URL: the explicit override, or computed from the server
    /// prefix
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}.api.mailchimp.com/3.0", self.server),
        }
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Timeout for the one-off specification fetch, in seconds
    #[serde(default = "default_spec_timeout")]
    pub spec_timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffSettings,

    /// Requests per second limit (0 disables rate limiting)
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            spec_timeout_seconds: default_spec_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffSettings::default(),
            requests_per_second: default_rps(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_spec_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_rps() -> u32 {
    10
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}
