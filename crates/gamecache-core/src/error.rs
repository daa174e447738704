//! Error types for gamecache.
//!
//! Request-time failures never surface to the page as errors; the router turns
//! them into synthetic responses. These types describe what went wrong inside
//! the worker so the precache, message and storage paths can log and report it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the gamecache library.
#[derive(Debug, Error)]
pub enum GameCacheError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    // Message channel errors
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for gamecache operations.
pub type Result<T> = std::result::Result<T, GameCacheError>;

impl From<std::io::Error> for GameCacheError {
    fn from(err: std::io::Error) -> Self {
        GameCacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for GameCacheError {
    fn from(err: serde_json::Error) -> Self {
        GameCacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for GameCacheError {
    fn from(err: rusqlite::Error) -> Self {
        GameCacheError::Storage {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl GameCacheError {
    /// Create an invalid URL error from a parse failure.
    pub fn invalid_url(url: impl Into<String>, err: url::ParseError) -> Self {
        GameCacheError::InvalidUrl {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        GameCacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }
}
