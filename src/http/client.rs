//! HTTP client with retry and rate limiting
//!
//! All Mailchimp requests go through [`HttpClient`]: it applies HTTP basic
//! auth (the fixed username placeholder plus the configured API key),
//! paces requests through the rate limiter, and retries transient failures
//! with configurable backoff. The OpenAPI specification document is fetched
//! through the same client but without credentials and with its own, much
//! shorter timeout.

use super::rate_limit::RateLimiter;
use crate::config::{HttpSettings, TapConfig, BASIC_AUTH_USERNAME};
use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue};
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Skip basic auth for this request
    pub unauthenticated: bool,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Merge a map of query parameters
    #[must_use]
    pub fn queries(mut self, params: HashMap<String, String>) -> Self {
        self.query.extend(params);
        self
    }

    /// Override the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send without credentials
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.unauthenticated = true;
        self
    }
}

/// Authenticated Mailchimp HTTP client
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: String,
    settings: HttpSettings,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Build a client from tap configuration
    pub fn new(config: &TapConfig) -> Result<Self> {
        let settings = config.http.clone();
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(format!("tap-mailchimp/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;

        let rate_limiter = if settings.requests_per_second > 0 {
            Some(RateLimiter::per_second(settings.requests_per_second))
        } else {
            None
        };

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            settings,
            rate_limiter,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get(&self, path: &str, config: RequestConfig) -> Result<Response> {
        self.request(Method::GET, path, config).await
    }

    /// Make a GET request and parse the JSON body
    pub async fn get_json(&self, path: &str, config: RequestConfig) -> Result<JsonValue> {
        let response = self.request(Method::GET, path, config).await?;
        let json = response.json().await.map_err(Error::Http)?;
        Ok(json)
    }

    /// Fetch the OpenAPI specification document
    ///
    /// The specification endpoint is public, so no credentials are sent; it
    /// also gets a shorter timeout than record fetches since a slow spec
    /// fetch should fail the run quickly rather than stall it.
    pub async fn fetch_spec(&self, url: &str) -> Result<JsonValue> {
        let config = RequestConfig::new()
            .timeout(Duration::from_secs(self.settings.spec_timeout_seconds))
            .unauthenticated();
        let response = self
            .request(Method::GET, url, config)
            .await
            .map_err(|e| Error::spec_fetch(e.to_string()))?;
        let json = response
            .json()
            .await
            .map_err(|e| Error::spec_fetch(format!("malformed specification body: {e}")))?;
        Ok(json)
    }

    /// Make a request with retries
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let full_url = self.build_url(path);
        let max_retries = self.settings.max_retries;
        let timeout = config
            .timeout
            .unwrap_or(Duration::from_secs(self.settings.timeout_seconds));

        let mut last_error = None;
        let mut attempt = 0;

        while attempt <= max_retries {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self
                .client
                .request(method.clone(), &full_url)
                .timeout(timeout);

            if !config.query.is_empty() {
                req = req.query(&config.query);
            }

            if !config.unauthenticated {
                req = req.basic_auth(BASIC_AUTH_USERNAME, Some(&self.api_key));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response);
                        if attempt < max_retries {
                            warn!(
                                "Rate limited (429), attempt {}/{}, waiting {}s",
                                attempt + 1,
                                max_retries + 1,
                                retry_after
                            );
                            tokio::time::sleep(Duration::from_secs(retry_after)).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after,
                        });
                    }

                    if status.is_server_error() && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Request failed with {}, attempt {}/{}, retrying in {:?}",
                            status.as_u16(),
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(Error::HttpStatus {
                            status: status.as_u16(),
                            body: String::new(),
                        });
                        continue;
                    }

                    if status.is_client_error() || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::HttpStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    debug!("Request succeeded: {} {}", method, full_url);
                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        if attempt < max_retries {
                            let delay = self.calculate_backoff(attempt);
                            warn!(
                                "Request timeout, attempt {}/{}, retrying in {:?}",
                                attempt + 1,
                                max_retries + 1,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            #[allow(clippy::cast_possible_truncation)]
                            {
                                last_error = Some(Error::Timeout {
                                    timeout_ms: timeout.as_millis() as u64,
                                });
                            }
                            continue;
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        return Err(Error::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }

                    if e.is_connect() && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Connection error, attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(Error::Http(e));
                        continue;
                    }

                    return Err(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Resolve a path against the base URL; absolute URLs pass through
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Calculate backoff delay for a given attempt
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial = Duration::from_millis(self.settings.retry_backoff.initial_ms);
        let delay = match self.settings.retry_backoff.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial * (attempt + 1),
            BackoffType::Exponential => initial * 2u32.saturating_pow(attempt),
        };

        std::cmp::min(delay, Duration::from_millis(self.settings.retry_backoff.max_ms))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Extract retry-after header value, defaulting to 60 seconds
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
