//! Error types for the Mailchimp tap
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the tap
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Discovery Errors
    // ============================================================================
    #[error("Failed to fetch API specification: {message}")]
    SpecFetch { message: String },

    #[error("No schema found for resource '{resource}' at {path}")]
    SchemaNotFound { resource: String, path: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    #[error("Stream '{stream}' not found")]
    StreamNotFound { stream: String },

    #[error("Cannot derive child context for stream '{stream}': record has no '{field}' field")]
    ContextDerivation { stream: String, field: String },

    #[error("Failed to extract records for '{stream}': {message}")]
    RecordExtraction { stream: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined placeholder in path template: {placeholder}")]
    UndefinedPlaceholder { placeholder: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a specification fetch error
    pub fn spec_fetch(message: impl Into<String>) -> Self {
        Self::SpecFetch {
            message: message.into(),
        }
    }

    /// Create a schema-not-found error
    pub fn schema_not_found(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self::SchemaNotFound {
            resource: resource.into(),
            path: path.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a stream-not-found error
    pub fn stream_not_found(stream: impl Into<String>) -> Self {
        Self::StreamNotFound {
            stream: stream.into(),
        }
    }

    /// Create a context derivation error
    pub fn context_derivation(stream: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ContextDerivation {
            stream: stream.into(),
            field: field.into(),
        }
    }

    /// Create a record extraction error
    pub fn record_extraction(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordExtraction {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined placeholder error
    pub fn undefined_placeholder(placeholder: impl Into<String>) -> Self {
        Self::UndefinedPlaceholder {
            placeholder: placeholder.into(),
        }
    }

    /// Check if this error is retryable at the transport layer
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error aborts the whole run rather than a single stream
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::SpecFetch { .. } | Error::Config { .. } | Error::MissingConfigField { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the tap
pub type Result<T> = std::result::Result<T, Error>;
