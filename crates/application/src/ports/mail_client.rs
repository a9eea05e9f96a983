//! Mail protocol ports
//!
//! One client instance serves one operation: connect, work, disconnect.
//! Connections are not pooled.

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{EmailAccount, EmailAddress, MailProtocol};
#[cfg(test)]
use mockall::automock;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::raw_message::RawMessage;
use crate::error::ApplicationError;

/// Result of a credential check; never an `Err`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub error: Option<String>,
}

impl ConnectionTest {
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// What to retrieve in one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ignored by POP3, which only has one mailbox
    pub folder: String,
    /// Most recent `limit` messages are returned
    pub limit: u32,
    /// Only messages received on or after this day
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message ready to hand to SMTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: EmailAddress,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Message-ID header value without angle brackets
    pub message_id: String,
}

/// IMAP or POP3 retrieval client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IncomingMailClient: Send + Sync {
    fn protocol(&self) -> MailProtocol;

    /// Connect, authenticate and disconnect
    async fn test_connection(&self) -> ConnectionTest;

    async fn connect(&self) -> Result<(), ApplicationError>;

    async fn fetch_emails(&self, options: &FetchOptions) -> Result<Vec<RawMessage>, ApplicationError>;

    async fn list_folders(&self) -> Result<Vec<String>, ApplicationError>;

    /// Safe to call when not connected
    async fn disconnect(&self) -> Result<(), ApplicationError>;
}

/// SMTP submission client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutgoingMailClient: Send + Sync {
    async fn test_connection(&self) -> ConnectionTest;

    async fn send_email(&self, email: &OutgoingEmail) -> Result<SendOutcome, ApplicationError>;

    /// Safe to call when not connected
    async fn close(&self) -> Result<(), ApplicationError>;
}

/// Builds protocol clients for an account
///
/// The password is passed in decrypted and is dropped with the client.
#[cfg_attr(test, automock)]
pub trait MailConnectorPort: Send + Sync {
    fn incoming(
        &self,
        account: &EmailAccount,
        password: SecretString,
    ) -> Result<Box<dyn IncomingMailClient>, ApplicationError>;

    fn outgoing(
        &self,
        account: &EmailAccount,
        password: SecretString,
    ) -> Result<Box<dyn OutgoingMailClient>, ApplicationError>;
}
