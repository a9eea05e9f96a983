//! Validated, lowercase mailbox address
//!
//! ```
//! use domain::EmailAddress;
//!
//! let email = EmailAddress::new(" Team@Example.COM ").unwrap();
//! assert_eq!(email.as_str(), "team@example.com");
//! assert_eq!(email.domain(), "example.com");
//! assert!(EmailAddress::new("no-at-sign").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::DomainError;

/// A validated email address, trimmed and normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress {
    #[validate(email)]
    value: String,
}

impl EmailAddress {
    /// Validate and normalize an address
    pub fn new(email: impl Into<String>) -> Result<Self, DomainError> {
        let candidate = Self {
            value: email.into().trim().to_lowercase(),
        };
        candidate
            .validate()
            .map_err(|_| DomainError::InvalidEmailAddress(candidate.value.clone()))?;
        Ok(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Part before the `@`
    pub fn local_part(&self) -> &str {
        self.value.split('@').next().unwrap_or_default()
    }

    /// Part after the `@`, used for Message-ID generation
    pub fn domain(&self) -> &str {
        self.value.rsplit('@').next().unwrap_or_default()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.value
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = EmailAddress::new("  Founder@Startup.IO ").unwrap();
        assert_eq!(email.as_str(), "founder@startup.io");
    }

    #[test]
    fn splits_local_part_and_domain() {
        let email = EmailAddress::new("ops@mail.startup.io").unwrap();
        assert_eq!(email.local_part(), "ops");
        assert_eq!(email.domain(), "mail.startup.io");
    }

    #[test]
    fn rejects_invalid_addresses() {
        for bad in ["", "plain", "@nouser.com", "user@"] {
            assert!(EmailAddress::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<EmailAddress, _> = serde_json::from_str("\"A@B.com\"");
        assert_eq!(ok.unwrap().as_str(), "a@b.com");

        let bad: Result<EmailAddress, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
