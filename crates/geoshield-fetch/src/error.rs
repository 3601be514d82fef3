//! Fetch error taxonomy.

use geoshield_cache::CacheError;
use geoshield_core::{AppError, ConfigError, NetworkError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Missing credential or similar; raised before any network attempt.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network unreachable, connection reset, timeout.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Upstream body was not valid JSON.
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A blocking cache task panicked or was cancelled.
    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Cache storage failed; passed through unmodified.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub fn missing_credential(name: &str) -> Self {
        Self::Config(format!("missing credential '{}'", name))
    }

    /// Wrap a reqwest error, stripping the URL so query-string credentials
    /// never end up in messages or logs.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }

    /// Whether the request may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Decode { .. }
        )
    }

    /// HTTP status, if the upstream answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Config(msg) => AppError::Config(ConfigError::MissingSetting(msg)),
            FetchError::Transport(e) if e.is_timeout() => AppError::Network(NetworkError::Timeout),
            FetchError::Transport(e) => {
                AppError::Network(NetworkError::ConnectionFailed(e.to_string()))
            }
            FetchError::HttpStatus { status, url } => {
                AppError::Network(NetworkError::ServerError { status, message: url })
            }
            FetchError::Decode { source, .. } => {
                AppError::Network(NetworkError::InvalidResponse(source.to_string()))
            }
            FetchError::Task(e) => AppError::Other(e.into()),
            FetchError::Cache(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn decode_error() -> FetchError {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        FetchError::Decode {
            url: "http://x".into(),
            source,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::HttpStatus { status: 503, url: "u".into() }.is_retryable());
        assert!(decode_error().is_retryable());
        assert!(!FetchError::missing_credential("appid").is_retryable());
    }

    #[test]
    fn test_missing_credential_names_parameter() {
        let err = FetchError::missing_credential("appid");
        assert!(err.to_string().contains("appid"));
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = FetchError::HttpStatus { status: 502, url: "u".into() }.into();
        assert!(matches!(
            app,
            AppError::Network(NetworkError::ServerError { status: 502, .. })
        ));

        let app: AppError = FetchError::missing_credential("key").into();
        assert!(matches!(app, AppError::Config(ConfigError::MissingSetting(_))));

        let app: AppError = decode_error().into();
        assert!(matches!(app, AppError::Network(NetworkError::InvalidResponse(_))));
    }
}
