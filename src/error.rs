// src/error.rs

//! Unified error handling for the relay.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Object storage error (S3 or local store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Secret retrieval failed
    #[error("Secret error: {0}")]
    Secret(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Source feed could not be parsed
    #[error("Feed parse error: {0}")]
    Feed(String),

    /// Stored RSS document could not be read or written
    #[error("RSS document error: {0}")]
    Xml(#[from] rss::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Flow or alias does not exist upstream
    #[error("Flow resource not found: {0}")]
    FlowNotFound(String),

    /// Flow service rejected the request
    #[error("Flow validation error: {0}")]
    FlowValidation(String),

    /// Flow service throttled the request
    #[error("Flow throttled: {0}")]
    FlowThrottled(String),

    /// Any other flow service failure
    #[error("Flow service error: {0}")]
    Flow(String),

    /// Alias with the requested name already exists on the flow
    #[error("Alias already exists on flow {flow_id}")]
    AliasConflict { flow_id: String },

    /// Classifier answered with something other than the two scope tokens
    #[error("Malformed classification token: {0:?}")]
    MalformedClassification(String),
}

impl AppError {
    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a secret retrieval error.
    pub fn secret(message: impl fmt::Display) -> Self {
        Self::Secret(message.to_string())
    }

    /// Create a feed parse error.
    pub fn feed(message: impl fmt::Display) -> Self {
        Self::Feed(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a generic flow service error.
    pub fn flow(message: impl fmt::Display) -> Self {
        Self::Flow(message.to_string())
    }

    /// Failure bucket used when logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage(_) | Self::Secret(_) | Self::Io(_) | Self::Http(_) => "access",
            Self::FlowNotFound(_)
            | Self::FlowValidation(_)
            | Self::FlowThrottled(_)
            | Self::Flow(_)
            | Self::AliasConflict { .. } => "upstream",
            Self::MalformedClassification(_) => "classification",
            Self::Config(_) | Self::Toml(_) | Self::Url(_) => "config",
            Self::Json(_) | Self::Feed(_) | Self::Xml(_) | Self::Validation(_) => "data",
        }
    }

    /// Whether the error came from the flow service.
    pub fn is_upstream(&self) -> bool {
        self.category() == "upstream"
    }
}
