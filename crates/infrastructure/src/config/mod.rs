//! Application configuration
//!
//! Split into focused sub-modules:
//! - `database`: SQLite database settings
//! - `security`: credential encryption key
//! - `mail`: protocol timeouts, TLS, sync limits and folder patterns
//! - `analysis`: post-sync webhook
//!
//! Sources, later ones overriding earlier: built-in defaults, an optional
//! `config.toml`, then `MAILSYNC_` environment variables with `__` between
//! nested keys (e.g. `MAILSYNC_SECURITY__ENCRYPTION_KEY`).

mod analysis;
mod database;
mod mail;
mod security;

use std::{fmt, path::Path};

use application::error::ApplicationError;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use analysis::AnalysisConfig;
pub use database::DatabaseConfig;
pub use mail::{MailConfig, MailTlsConfig};
pub use security::{DEV_ENCRYPTION_KEY, SecurityConfig};

use crate::telemetry::TelemetryConfig;

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Application environment (development or production)
///
/// Controls security validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment - relaxed security warnings
    #[default]
    Development,
    /// Production environment - strict security validation
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Use 'development' or 'production'"
            )),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Secrets are redacted from `Debug`
    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from `config.toml` in the working directory (if present) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load from an explicit file (which must exist) or the default `config.toml`
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("MAILSYNC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject settings that must not reach production
    ///
    /// The development encryption key is refused in production and only
    /// warned about otherwise.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.security.uses_dev_key() {
            if self.environment == Environment::Production {
                return Err(ApplicationError::Configuration(
                    "security.encryption_key must be set in production".to_string(),
                ));
            }
            warn!(environment = %self.environment, "Using the development encryption key");
        }
        if self.security.encryption_salt.is_empty() {
            return Err(ApplicationError::Configuration(
                "security.encryption_salt must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    #[test]
    fn environment_default_is_development() {
        assert_eq!(Environment::default(), Environment::Development);
    }

    #[test]
    fn environment_from_str() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(
            "DEVELOPMENT".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert!("staging".parse::<Environment>().unwrap_err().contains("Invalid environment"));
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "mailsync.db");
        assert!(config.database.run_migrations);
        assert_eq!(config.security.encryption_salt, "salt");
        assert!(config.security.uses_dev_key());
        assert_eq!(config.mail.default_sync_limit, 50);
        assert_eq!(config.mail.per_folder_sync_limit, 30);
        assert!(config.mail.tls.verify_certificates);
        assert!(config.analysis.webhook_url().is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "environment": "production",
            "security": {"encryption_key": "prod-passphrase"},
            "mail": {"command_timeout_secs": 5, "folder_patterns": {"contains": ["archive"]}}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.security.encryption_key.expose_secret(), "prod-passphrase");
        assert_eq!(config.security.encryption_salt, "salt");
        assert_eq!(config.mail.timeouts().command.as_secs(), 5);
        assert_eq!(config.mail.timeouts().connect.as_secs(), 30);
        assert_eq!(config.mail.folder_patterns.contains, vec!["archive"]);
        assert_eq!(config.mail.folder_patterns.exact, vec!["inbox"]);
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\npath = \":memory:\"\n\n[analysis]\nwebhook_url = \"http://classifier/analyze\"\n"
        )
        .unwrap();

        let config = AppConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.analysis.webhook_url(), Some("http://classifier/analyze"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load_from(Some(Path::new("/nonexistent/mailsync.toml"))).is_err());
    }

    #[test]
    fn dev_key_is_rejected_in_production() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.environment = Environment::Production;
        assert!(matches!(
            config.validate(),
            Err(ApplicationError::Configuration(_))
        ));

        config.security.encryption_key = SecretString::from("rotated-production-key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_encryption_key() {
        let config = AppConfig::default();
        let printed = format!("{config:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains(DEV_ENCRYPTION_KEY));
    }

    #[test]
    fn mail_tls_maps_to_client_config() {
        let tls = MailTlsConfig {
            verify_certificates: false,
            min_tls_version: "1.2".to_string(),
            ca_cert_path: Some("/etc/mail-ca.pem".to_string()),
            allow_plaintext_auth: true,
        }
        .to_tls_config();
        assert!(!tls.should_verify());
        assert!(tls.allow_plaintext_auth);
        assert!(!MailTlsConfig::default().to_tls_config().allow_plaintext_auth);
        assert_eq!(
            tls.ca_cert_path.as_deref(),
            Some(Path::new("/etc/mail-ca.pem"))
        );
    }
}
