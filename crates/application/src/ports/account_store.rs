//! Account store port - persistence of connected mailbox accounts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{AccountId, EmailAccount, UserId};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for account persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountStorePort: Send + Sync {
    async fn insert(&self, account: &EmailAccount) -> Result<(), ApplicationError>;

    /// Get an account by id, active or not
    async fn get(&self, id: &AccountId) -> Result<Option<EmailAccount>, ApplicationError>;

    /// Active accounts of a user, newest first
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EmailAccount>, ApplicationError>;

    /// Remove the account and, by cascade, its messages
    ///
    /// Returns `false` if no such account existed.
    async fn delete(&self, id: &AccountId) -> Result<bool, ApplicationError>;

    async fn set_active(&self, id: &AccountId, active: bool) -> Result<bool, ApplicationError>;

    /// Set `last_sync_at` and clear `sync_error`
    async fn record_sync_success(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), ApplicationError>;

    async fn record_sync_failure(&self, id: &AccountId, error: &str)
    -> Result<(), ApplicationError>;
}
