//! Error types for the tipster bot core

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, TipsterError>;

#[derive(Error, Debug)]
pub enum TipsterError {

    // =============================
    // Core Dispatch Errors
    // =============================

    /// Unknown language or category in the phrase table. Fatal to the request.
    #[error("Response not found: {0}")]
    NotFound(String),

    #[error("Classification failure: {0}")]
    ClassificationFailure(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Fetch timed out: {0}")]
    Timeout(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TipsterError {
    /// Errors that the fallback policies are allowed to absorb.
    pub fn is_external_fetch_failure(&self) -> bool {
        matches!(
            self,
            TipsterError::Transport(_)
                | TipsterError::Auth(_)
                | TipsterError::InvalidResponse(_)
                | TipsterError::Timeout(_)
                | TipsterError::HttpError(_)
                | TipsterError::SerializationError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_kinds() {
        assert!(TipsterError::Transport("down".into()).is_external_fetch_failure());
        assert!(TipsterError::Timeout("sports_data".into()).is_external_fetch_failure());
        assert!(!TipsterError::NotFound("xx/welcome".into()).is_external_fetch_failure());
        assert!(!TipsterError::StoreUnavailable("pg".into()).is_external_fetch_failure());
    }
}
