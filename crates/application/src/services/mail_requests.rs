//! Inputs and results of the mail service operations

use chrono::NaiveDate;
use domain::{AccountId, EmailAccount, EmailAddress, EmailProvider, TeamId, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ports::OutgoingAttachment;

/// Error text returned when an operation targets a missing account
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";

/// Request to connect a new mailbox
///
/// Host and port overrides replace the provider preset field by field.
#[derive(Debug)]
pub struct NewAccountRequest {
    pub user_id: UserId,
    pub team_id: Option<TeamId>,
    pub email_address: EmailAddress,
    pub password: SecretString,
    pub provider: EmailProvider,
    pub display_name: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
}

impl NewAccountRequest {
    pub fn new(
        user_id: UserId,
        email_address: EmailAddress,
        password: SecretString,
        provider: EmailProvider,
    ) -> Self {
        Self {
            user_id,
            team_id: None,
            email_address,
            password,
            provider,
            display_name: None,
            imap_host: None,
            imap_port: None,
            smtp_host: None,
            smtp_port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AddAccountResult {
    Added { account: Box<EmailAccount> },
    /// A connection check failed; nothing was stored
    Rejected { error: String },
}

impl AddAccountResult {
    pub const fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Added { .. } => None,
            Self::Rejected { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Defaults to `INBOX`; ignored for POP3
    pub folder: Option<String>,
    pub limit: Option<u32>,
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub synced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub const fn synced(count: usize) -> Self {
        Self {
            synced: count,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            synced: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllFoldersOptions {
    /// Per-folder limit
    pub limit: Option<u32>,
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSyncResult {
    pub synced: usize,
    /// Folders that synced without error, in sync order
    pub folders: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEmailRequest {
    pub account_id: AccountId,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

impl SendEmailRequest {
    pub fn new(account_id: AccountId, to: Vec<String>, subject: impl Into<String>) -> Self {
        Self {
            account_id,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body_text: None,
            body_html: None,
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}
