//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mail server or webhook failure
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Stored credential could not be decrypted
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }

    /// Message without the variant prefix, as stored in `sync_error`
    pub fn detail(&self) -> String {
        match self {
            Self::Domain(e) => e.to_string(),
            Self::NotFound(m)
            | Self::ExternalService(m)
            | Self::Decryption(m)
            | Self::Configuration(m)
            | Self::Internal(m) => m.clone(),
        }
    }
}
