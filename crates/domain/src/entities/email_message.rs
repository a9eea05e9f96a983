//! Canonical stored message, regardless of the protocol it came from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{AccountId, EmailId};

/// Folder that sent-mail mirrors are stored in
pub const SENT_FOLDER: &str = "Sent";

/// Default folder for incoming mail
pub const INBOX_FOLDER: &str = "INBOX";

/// A message as persisted locally
///
/// `(account_id, message_id)` is the natural key; re-syncing the same message
/// updates this row instead of inserting a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: EmailId,
    pub account_id: AccountId,
    pub message_id: String,
    /// IMAP UID, 0 for POP3 and sent mirrors
    pub uid: u32,
    pub folder: String,
    pub subject: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_sent: bool,
    pub is_trash: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

impl EmailMessage {
    /// An empty unread message in `folder`, received now
    pub fn new(account_id: AccountId, message_id: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            id: EmailId::new(),
            account_id,
            message_id: message_id.into(),
            uid: 0,
            folder: folder.into(),
            subject: String::new(),
            from_address: String::new(),
            from_name: None,
            to_addresses: Vec::new(),
            cc_addresses: Vec::new(),
            bcc_addresses: Vec::new(),
            body_text: None,
            body_html: None,
            is_read: false,
            is_starred: false,
            is_sent: false,
            is_trash: false,
            sent_at: None,
            received_at: Utc::now(),
        }
    }

    /// `"Name <address>"` when a name is known, the bare address otherwise
    pub fn sender_display(&self) -> String {
        match self.from_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{name} <{}>", self.from_address),
            None => self.from_address.clone(),
        }
    }

    /// Case-insensitive substring match over subject, plain body and sender address
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.subject.to_lowercase().contains(&needle)
            || self.from_address.to_lowercase().contains(&needle)
            || self
                .body_text
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle))
    }
}
