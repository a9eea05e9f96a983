//! Errors raised while building domain values

use thiserror::Error;

/// Which side of an account a server setting belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    Incoming,
    Outgoing,
}

impl std::fmt::Display for ServerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        })
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid email address: {0}")]
    InvalidEmailAddress(String),

    /// Not one of the provider presets
    #[error("Unknown email provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A custom provider was added without a host for this side
    #[error("{0} server host is required")]
    MissingServerHost(ServerRole),
}
