//! Message store port - persistence of synchronized and sent messages

use async_trait::async_trait;
use domain::{AccountId, EmailId, EmailMessage, MailboxStats};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Page size used when an offset is given without a limit
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Filters for listing an account's messages
///
/// Results are always ordered by `received_at`, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailQuery {
    pub folder: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub unread_only: bool,
    /// Case-insensitive substring over subject, body text and sender address
    pub search: Option<String>,
    /// `Some(true)` lists only trashed messages, `Some(false)` hides them
    pub in_trash: Option<bool>,
}

impl EmailQuery {
    #[must_use]
    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub const fn unread_only(mut self) -> Self {
        self.unread_only = true;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Row limit to apply, if any
    pub fn effective_limit(&self) -> Option<u32> {
        self.limit
            .or_else(|| self.offset.map(|_| DEFAULT_PAGE_SIZE))
    }

    /// Search term with surrounding whitespace removed, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Port for message persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageStorePort: Send + Sync {
    /// Insert or update by `(account_id, message_id)`
    ///
    /// Content fields are overwritten. Local star and trash flags of an existing
    /// row survive; so does its read flag when the incoming row has no server
    /// uid (POP3).
    async fn upsert(&self, message: &EmailMessage) -> Result<(), ApplicationError>;

    /// Plain insert, used for sent-mail mirrors
    async fn insert(&self, message: &EmailMessage) -> Result<(), ApplicationError>;

    async fn get(&self, id: &EmailId) -> Result<Option<EmailMessage>, ApplicationError>;

    async fn query(
        &self,
        account_id: &AccountId,
        query: &EmailQuery,
    ) -> Result<Vec<EmailMessage>, ApplicationError>;

    /// Flag setters return `false` when the message does not exist
    async fn set_read(&self, id: &EmailId, read: bool) -> Result<bool, ApplicationError>;

    async fn set_starred(&self, id: &EmailId, starred: bool) -> Result<bool, ApplicationError>;

    async fn set_trash(&self, id: &EmailId, trash: bool) -> Result<bool, ApplicationError>;

    async fn delete(&self, id: &EmailId) -> Result<bool, ApplicationError>;

    async fn stats(&self, account_id: &AccountId) -> Result<MailboxStats, ApplicationError>;
}
