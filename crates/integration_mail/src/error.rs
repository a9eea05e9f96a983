//! Mail protocol errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    /// TCP connect or TLS handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Server rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    /// Unexpected or negative server reply
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Operation requires an open session
    #[error("Not connected")]
    NotConnected,
}

impl MailError {
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}
