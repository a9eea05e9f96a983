//! Credential cipher port - reversible encryption of stored mailbox passwords
//!
//! Unlike a password hash, the plaintext has to be recovered to log in to
//! the user's mail server, so this is symmetric encryption.

#[cfg(test)]
use mockall::automock;
use secrecy::SecretString;

use crate::error::ApplicationError;

/// Port for encrypting and decrypting mailbox passwords
#[cfg_attr(test, automock)]
pub trait CredentialCipherPort: Send + Sync {
    /// Encrypt a password into its textual storage form
    fn encrypt(&self, plaintext: &str) -> Result<String, ApplicationError>;

    /// Decrypt a stored password
    ///
    /// Returns [`ApplicationError::Decryption`] for malformed or tampered input.
    fn decrypt(&self, encoded: &str) -> Result<SecretString, ApplicationError>;
}
