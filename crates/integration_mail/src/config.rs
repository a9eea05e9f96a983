//! Connection settings shared by all protocol clients

use std::{path::PathBuf, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::MailError;

/// TLS settings for mail server connections
///
/// Certificate verification is on unless explicitly disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// `None` means verify
    #[serde(default)]
    pub verify_certificates: Option<bool>,

    /// Extra trusted root in PEM format, for servers behind a private CA
    pub ca_cert_path: Option<PathBuf>,

    /// `"1.0"`, `"1.1"` or `"1.2"` (default)
    pub min_tls_version: String,

    /// Let SMTP log in over plaintext when the server offers no STARTTLS
    #[serde(default)]
    pub allow_plaintext_auth: bool,
}

impl TlsConfig {
    #[must_use]
    pub fn should_verify(&self) -> bool {
        self.verify_certificates.unwrap_or(true)
    }

    /// Accept any certificate, for local test servers only
    #[must_use]
    pub fn insecure() -> Self {
        warn!("TLS certificate verification disabled for mail connections");
        Self {
            verify_certificates: Some(false),
            ..Self::default()
        }
    }

    pub fn with_ca_cert(ca_cert_path: impl Into<PathBuf>) -> Self {
        Self {
            verify_certificates: Some(true),
            ca_cert_path: Some(ca_cert_path.into()),
            ..Self::default()
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_certificates: None,
            ca_cert_path: None,
            min_tls_version: "1.2".to_string(),
            allow_plaintext_auth: false,
        }
    }
}

/// Per-connection time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailTimeouts {
    /// TCP connect plus TLS handshake
    pub connect: Duration,
    /// Waiting for any single server reply
    pub command: Duration,
}

impl Default for MailTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            command: Duration::from_secs(60),
        }
    }
}

/// One server endpoint plus the credentials to log in with
#[derive(Debug, Clone)]
pub struct MailServerConfig {
    pub host: String,
    pub port: u16,
    /// TLS from the first byte; otherwise plaintext (SMTP upgrades with STARTTLS)
    pub secure: bool,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsConfig,
    pub timeouts: MailTimeouts,
}

impl MailServerConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        secure: bool,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
            username: username.into(),
            password,
            tls: TlsConfig::default(),
            timeouts: MailTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: MailTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn validate(&self) -> Result<(), MailError> {
        if self.host.trim().is_empty() {
            return Err(MailError::ConnectionFailed("Server host is required".to_string()));
        }
        if self.port == 0 {
            return Err(MailError::ConnectionFailed("Server port is required".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(MailError::InvalidAddress("Username is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailServerConfig {
        MailServerConfig::new(
            "imap.gmail.com",
            993,
            true,
            "ceo@startup.io",
            SecretString::from("app-password"),
        )
    }

    #[test]
    fn tls_verifies_by_default() {
        assert!(TlsConfig::default().should_verify());
        assert!(!TlsConfig::insecure().should_verify());
        assert!(TlsConfig::with_ca_cert("/etc/ca.pem").should_verify());
    }

    #[test]
    fn debug_does_not_leak_password() {
        let printed = format!("{:?}", config());
        assert!(!printed.contains("app-password"));
    }

    #[test]
    fn validate_requires_host_and_user() {
        assert!(config().validate().is_ok());

        let mut no_host = config();
        no_host.host = " ".to_string();
        assert!(no_host.validate().is_err());

        let mut no_user = config();
        no_user.username = String::new();
        assert!(matches!(no_user.validate(), Err(MailError::InvalidAddress(_))));
    }

    #[test]
    fn address_joins_host_and_port() {
        assert_eq!(config().address(), "imap.gmail.com:993");
    }
}
