//! Messages as fetched from a server, before normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mailbox in an address header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    pub address: String,
    pub name: Option<String>,
}

impl MailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Parsed headers and bodies of one message
///
/// Every field is optional because real-world mail routinely omits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub bcc: Vec<MailAddress>,
    /// `Date:` header
    pub date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// IMAP system flags relevant to the local copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapFlags {
    pub seen: bool,
    pub flagged: bool,
    pub answered: bool,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImapMessage {
    pub uid: u32,
    pub flags: ImapFlags,
    /// Server arrival time
    pub internal_date: Option<DateTime<Utc>>,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPop3Message {
    /// Message number within the current POP3 session
    pub number: u32,
    /// UIDL value, stable across sessions when the server supports it
    pub unique_id: Option<String>,
    pub size: u64,
    pub content: MessageContent,
}

/// A fetched message tagged with the protocol that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum RawMessage {
    Imap(RawImapMessage),
    Pop3(RawPop3Message),
}

impl RawMessage {
    pub const fn content(&self) -> &MessageContent {
        match self {
            Self::Imap(m) => &m.content,
            Self::Pop3(m) => &m.content,
        }
    }
}
