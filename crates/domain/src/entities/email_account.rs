//! Connected mailbox account

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{
    AccountId, EmailAddress, EmailProvider, MailProtocol, ServerEndpoint, TeamId, UserId,
};

/// Outcome of the most recent synchronization attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SyncStatus {
    NeverSynced,
    Synced,
    Failed(String),
}

/// A mailbox the user connected, with its server settings and encrypted password
///
/// The password is only ever held here in `ivHex:authTagHex:cipherHex` form and is
/// neither serialized nor printed by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailAccount {
    pub id: AccountId,
    pub user_id: UserId,
    pub team_id: Option<TeamId>,
    pub email_address: EmailAddress,
    pub provider: EmailProvider,
    /// IMAP or POP3 server, depending on `provider.protocol()`
    pub incoming: ServerEndpoint,
    pub outgoing: ServerEndpoint,
    pub display_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub encrypted_password: String,
    /// Cleared instead of deleting the row when the account is deactivated
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailAccount {
    /// Create a new active account that has never been synced
    pub fn new(
        user_id: UserId,
        email_address: EmailAddress,
        provider: EmailProvider,
        incoming: ServerEndpoint,
        outgoing: ServerEndpoint,
        encrypted_password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            user_id,
            team_id: None,
            email_address,
            provider,
            incoming,
            outgoing,
            display_name: None,
            encrypted_password: encrypted_password.into(),
            is_active: true,
            last_sync_at: None,
            sync_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub const fn protocol(&self) -> MailProtocol {
        self.provider.protocol()
    }

    pub fn sync_status(&self) -> SyncStatus {
        match (&self.sync_error, self.last_sync_at) {
            (Some(err), _) => SyncStatus::Failed(err.clone()),
            (None, Some(_)) => SyncStatus::Synced,
            (None, None) => SyncStatus::NeverSynced,
        }
    }

    pub fn record_sync_success(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(at);
        self.sync_error = None;
        self.updated_at = at;
    }

    pub fn record_sync_failure(&mut self, error: impl Into<String>) {
        self.sync_error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

impl fmt::Debug for EmailAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("team_id", &self.team_id)
            .field("email_address", &self.email_address)
            .field("provider", &self.provider)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .field("display_name", &self.display_name)
            .field("encrypted_password", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .field("last_sync_at", &self.last_sync_at)
            .field("sync_error", &self.sync_error)
            .finish_non_exhaustive()
    }
}
