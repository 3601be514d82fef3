//! Centralized error types for geoshield.
//!
//! Each crate keeps its own precise error enum; this module provides the
//! application-level hierarchy those errors convert into at the edges, with
//! `user_message()` for text that is safe to show to API consumers.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream service answered but reported a failure of its own.
    #[error("Service error: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a message suitable for returning to API consumers.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Service(_) => "The upstream service reported an error.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity, payloads).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "Unable to reach the upstream service.",
            NetworkError::Timeout => "The upstream service timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The upstream service is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { status, .. } if *status == 429 => {
                "The upstream service is rate limiting requests. Please wait."
            }
            NetworkError::ServerError { .. } => "The upstream request was rejected.",
            NetworkError::InvalidResponse(_) => "Received an unexpected response upstream.",
        }
    }
}

/// Cache database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => "Unable to open the response cache.",
            DatabaseError::QueryFailed(_) => "A cache operation failed. Please try again.",
            DatabaseError::Corruption(_) => {
                "The response cache may be corrupted. Consider deleting it."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err = ConfigError::MissingSetting("weather.api_key".into());
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Config(ConfigError::MissingSetting(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Network(NetworkError::Timeout);
        assert_eq!(
            app_err.user_message(),
            "The upstream service timed out. Please try again."
        );
    }

    #[test]
    fn test_server_error_messages_by_status() {
        let unavailable = NetworkError::ServerError { status: 503, message: String::new() };
        let limited = NetworkError::ServerError { status: 429, message: String::new() };
        let rejected = NetworkError::ServerError { status: 404, message: String::new() };

        assert!(unavailable.user_message().contains("issues"));
        assert!(limited.user_message().contains("rate limiting"));
        assert!(rejected.user_message().contains("rejected"));
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = DatabaseError::QueryFailed("no such table: api_cache".into());
        assert!(err.to_string().contains("api_cache"));
    }
}
