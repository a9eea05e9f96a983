//! Mail providers, retrieval protocols and their connection presets

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Protocol used to retrieve incoming mail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProtocol {
    Imap,
    Pop3,
}

impl MailProtocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
        }
    }

    /// Label used in user-facing connection errors
    pub const fn label(self) -> &'static str {
        match self {
            Self::Imap => "IMAP",
            Self::Pop3 => "POP3",
        }
    }
}

impl fmt::Display for MailProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host/port pair plus whether TLS starts immediately on connect
///
/// For SMTP, `secure = false` means plaintext upgraded with STARTTLS when offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// Returns a copy with any given override applied
    ///
    /// Blank hosts and port 0 count as absent and keep the current value.
    #[must_use]
    pub fn with_overrides(&self, host: Option<&str>, port: Option<u16>) -> Self {
        Self {
            host: host
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map_or_else(|| self.host.clone(), str::to_string),
            port: port.filter(|&p| p != 0).unwrap_or(self.port),
            secure: self.secure,
        }
    }

    pub fn has_host(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Default connection settings for a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPreset {
    pub protocol: MailProtocol,
    pub incoming: ServerEndpoint,
    pub outgoing: ServerEndpoint,
}

/// Supported mailbox providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    /// Gmail over IMAP with an app password
    Gmail,
    /// WhoisWorks hosted mail, POP3 only
    Whois,
    /// Any IMAP server; the caller supplies the hosts
    Custom,
}

impl EmailProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Whois => "whois",
            Self::Custom => "custom",
        }
    }

    pub const fn protocol(self) -> MailProtocol {
        match self {
            Self::Whois => MailProtocol::Pop3,
            Self::Gmail | Self::Custom => MailProtocol::Imap,
        }
    }

    pub fn preset(self) -> ProviderPreset {
        match self {
            Self::Gmail => ProviderPreset {
                protocol: MailProtocol::Imap,
                incoming: ServerEndpoint::new("imap.gmail.com", 993, true),
                outgoing: ServerEndpoint::new("smtp.gmail.com", 587, false),
            },
            Self::Whois => ProviderPreset {
                protocol: MailProtocol::Pop3,
                incoming: ServerEndpoint::new("pop.whoisworks.com", 995, true),
                outgoing: ServerEndpoint::new("smtp.whoisworks.com", 587, false),
            },
            Self::Custom => ProviderPreset {
                protocol: MailProtocol::Imap,
                incoming: ServerEndpoint::new("", 993, true),
                outgoing: ServerEndpoint::new("", 587, false),
            },
        }
    }
}

impl fmt::Display for EmailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "whois" => Ok(Self::Whois),
            "custom" => Ok(Self::Custom),
            other => Err(DomainError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmail_preset_uses_imap_and_starttls_submission() {
        let preset = EmailProvider::Gmail.preset();
        assert_eq!(preset.protocol, MailProtocol::Imap);
        assert_eq!(preset.incoming, ServerEndpoint::new("imap.gmail.com", 993, true));
        assert_eq!(preset.outgoing, ServerEndpoint::new("smtp.gmail.com", 587, false));
    }

    #[test]
    fn whois_is_pop3() {
        assert_eq!(EmailProvider::Whois.protocol(), MailProtocol::Pop3);
        let preset = EmailProvider::Whois.preset();
        assert_eq!(preset.incoming.host, "pop.whoisworks.com");
        assert_eq!(preset.incoming.port, 995);
    }

    #[test]
    fn custom_preset_has_no_host() {
        let preset = EmailProvider::Custom.preset();
        assert!(!preset.incoming.has_host());
        assert!(!preset.outgoing.has_host());
        assert_eq!(preset.incoming.port, 993);
        assert_eq!(preset.outgoing.port, 587);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = ServerEndpoint::new("imap.gmail.com", 993, true);
        let host_only = base.with_overrides(Some("imap.corp.io"), None);
        assert_eq!(host_only, ServerEndpoint::new("imap.corp.io", 993, true));

        let port_only = base.with_overrides(None, Some(1993));
        assert_eq!(port_only, ServerEndpoint::new("imap.gmail.com", 1993, true));
    }

    #[test]
    fn blank_host_and_zero_port_fall_back_to_preset() {
        let base = EmailProvider::Gmail.preset().incoming;
        assert_eq!(base.with_overrides(Some(""), Some(0)), base);
        assert_eq!(base.with_overrides(Some("   "), None), base);
        assert_eq!(
            base.with_overrides(Some(" imap.corp.io "), Some(0)),
            ServerEndpoint::new("imap.corp.io", base.port, true)
        );
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Gmail".parse::<EmailProvider>().unwrap(), EmailProvider::Gmail);
        assert_eq!(" whois ".parse::<EmailProvider>().unwrap(), EmailProvider::Whois);
        assert!("outlook".parse::<EmailProvider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&EmailProvider::Custom).unwrap();
        assert_eq!(json, "\"custom\"");
    }
}
