//! Mail server connection and sync settings.

use std::{path::PathBuf, time::Duration};

use application::{FolderPatterns, FolderSelector, SyncLimits, error::ApplicationError};
use integration_mail::{MailTimeouts, TlsConfig};
use serde::{Deserialize, Serialize};

use super::default_true;

/// Mail protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// TCP connect plus TLS handshake, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Wait for any single server reply, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Messages fetched by a single-folder sync without an explicit limit
    #[serde(default = "default_sync_limit")]
    pub default_sync_limit: u32,

    /// Messages fetched per folder by an all-folder sync without an explicit limit
    #[serde(default = "default_per_folder_limit")]
    pub per_folder_sync_limit: u32,

    #[serde(default)]
    pub tls: MailTlsConfig,

    /// Folders visited by an all-folder sync
    #[serde(default)]
    pub folder_patterns: FolderPatterns,
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_command_timeout() -> u64 {
    60
}

const fn default_sync_limit() -> u32 {
    50
}

const fn default_per_folder_limit() -> u32 {
    30
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            default_sync_limit: default_sync_limit(),
            per_folder_sync_limit: default_per_folder_limit(),
            tls: MailTlsConfig::default(),
            folder_patterns: FolderPatterns::default(),
        }
    }
}

impl MailConfig {
    pub const fn timeouts(&self) -> MailTimeouts {
        MailTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            command: Duration::from_secs(self.command_timeout_secs),
        }
    }

    pub const fn sync_limits(&self) -> SyncLimits {
        SyncLimits {
            default_limit: self.default_sync_limit,
            per_folder_limit: self.per_folder_sync_limit,
        }
    }

    pub fn folder_selector(&self) -> Result<FolderSelector, ApplicationError> {
        FolderSelector::new(&self.folder_patterns)
    }
}

/// TLS settings for IMAP, POP3 and SMTP connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailTlsConfig {
    /// Verify server certificates (default: true)
    #[serde(default = "default_true")]
    pub verify_certificates: bool,

    /// Minimum TLS version ("1.0", "1.1" or "1.2")
    #[serde(default = "default_min_tls")]
    pub min_tls_version: String,

    /// Extra trusted root in PEM format
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    /// Allow SMTP AUTH on a `secure = false` server that offers no STARTTLS
    #[serde(default)]
    pub allow_plaintext_auth: bool,
}

fn default_min_tls() -> String {
    "1.2".to_string()
}

impl Default for MailTlsConfig {
    fn default() -> Self {
        Self {
            verify_certificates: true,
            min_tls_version: default_min_tls(),
            ca_cert_path: None,
            allow_plaintext_auth: false,
        }
    }
}

impl MailTlsConfig {
    /// Convert to `integration_mail`'s `TlsConfig`
    #[must_use]
    pub fn to_tls_config(&self) -> TlsConfig {
        TlsConfig {
            verify_certificates: Some(self.verify_certificates),
            min_tls_version: self.min_tls_version.clone(),
            ca_cert_path: self.ca_cert_path.as_ref().map(PathBuf::from),
            allow_plaintext_auth: self.allow_plaintext_auth,
        }
    }
}
