//! Credential encryption settings.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Passphrase used when none is configured
///
/// Matches the key existing deployments encrypted their stored passwords
/// with, so their rows stay readable in development.
pub const DEV_ENCRYPTION_KEY: &str = "glowus-email-key-32-bytes-here!!";

/// Credential encryption configuration
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Passphrase the AES-256 key is derived from
    #[serde(default = "default_encryption_key")]
    pub encryption_key: SecretString,

    /// scrypt salt
    #[serde(default = "default_encryption_salt")]
    pub encryption_salt: String,
}

fn default_encryption_key() -> SecretString {
    SecretString::from(DEV_ENCRYPTION_KEY)
}

fn default_encryption_salt() -> String {
    "salt".to_string()
}

impl SecurityConfig {
    /// Whether the built-in development passphrase is in use
    pub fn uses_dev_key(&self) -> bool {
        self.encryption_key.expose_secret() == DEV_ENCRYPTION_KEY
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            encryption_key: default_encryption_key(),
            encryption_salt: default_encryption_salt(),
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encryption_key", &"[REDACTED]")
            .field("encryption_salt", &self.encryption_salt)
            .finish()
    }
}
