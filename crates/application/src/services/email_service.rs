//! Email service
//!
//! Onboards mailbox accounts, synchronizes their folders into the message
//! store, and exposes message queries, flag updates and outbound sending.
//!
//! Concurrent syncs of the same account are not serialized. Both write
//! bookkeeping and the last one wins; upserts keep the message rows unique.

use std::{fmt, sync::Arc};

use chrono::Utc;
use domain::{
    AccountId, DomainError, EmailAccount, EmailId, EmailMessage, INBOX_FOLDER, MailProtocol,
    MailboxStats, SENT_FOLDER, ServerRole, UserId,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use super::{
    folder_selector::FolderSelector,
    mail_requests::{
        ACCOUNT_NOT_FOUND, AddAccountResult, AllFoldersOptions, FolderSyncResult,
        NewAccountRequest, SendEmailRequest, SendResult, SyncOptions, SyncResult,
    },
    message_normalizer::normalize_message,
};
use crate::{
    error::ApplicationError,
    ports::{
        AccountStorePort, ConnectionTest, CredentialCipherPort, EmailQuery, FetchOptions,
        MailAnalysisPort, MailConnectorPort, MessageStorePort, NoOpMailAnalysis, OutgoingEmail,
        RawMessage,
    },
};

const CHECK_CREDENTIALS: &str = "이메일 주소와 비밀번호를 확인하세요.";
const CHECK_SETTINGS: &str = "이메일 설정을 확인하세요.";

/// How many messages a sync fetches when the caller gives no limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Single-folder sync
    pub default_limit: u32,
    /// Each folder of an all-folder sync
    pub per_folder_limit: u32,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            default_limit: 50,
            per_folder_limit: 30,
        }
    }
}

/// Orchestrates mailbox accounts and their messages
pub struct EmailService {
    accounts: Arc<dyn AccountStorePort>,
    messages: Arc<dyn MessageStorePort>,
    cipher: Arc<dyn CredentialCipherPort>,
    connector: Arc<dyn MailConnectorPort>,
    analysis: Arc<dyn MailAnalysisPort>,
    folders: FolderSelector,
    limits: SyncLimits,
}

impl fmt::Debug for EmailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailService")
            .field("folders", &self.folders)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service without post-sync analysis
    pub fn new(
        accounts: Arc<dyn AccountStorePort>,
        messages: Arc<dyn MessageStorePort>,
        cipher: Arc<dyn CredentialCipherPort>,
        connector: Arc<dyn MailConnectorPort>,
    ) -> Self {
        Self {
            accounts,
            messages,
            cipher,
            connector,
            analysis: Arc::new(NoOpMailAnalysis),
            folders: FolderSelector::default(),
            limits: SyncLimits::default(),
        }
    }

    #[must_use]
    pub fn with_analysis(mut self, analysis: Arc<dyn MailAnalysisPort>) -> Self {
        self.analysis = analysis;
        self
    }

    #[must_use]
    pub fn with_folder_selector(mut self, folders: FolderSelector) -> Self {
        self.folders = folders;
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: SyncLimits) -> Self {
        self.limits = limits;
        self
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Verify both servers accept the credentials, then store the account
    ///
    /// A failed connection check is reported as [`AddAccountResult::Rejected`]
    /// and nothing is persisted.
    #[instrument(skip(self, request), fields(email = %request.email_address, provider = %request.provider))]
    pub async fn add_account(
        &self,
        request: NewAccountRequest,
    ) -> Result<AddAccountResult, ApplicationError> {
        let preset = request.provider.preset();
        let incoming = preset
            .incoming
            .with_overrides(request.imap_host.as_deref(), request.imap_port);
        let outgoing = preset
            .outgoing
            .with_overrides(request.smtp_host.as_deref(), request.smtp_port);
        if !incoming.has_host() {
            return Err(DomainError::MissingServerHost(ServerRole::Incoming).into());
        }
        if !outgoing.has_host() {
            return Err(DomainError::MissingServerHost(ServerRole::Outgoing).into());
        }

        let mut account = EmailAccount::new(
            request.user_id,
            request.email_address,
            request.provider,
            incoming,
            outgoing,
            String::new(),
        );
        account.team_id = request.team_id;
        account.display_name = request.display_name.filter(|n| !n.trim().is_empty());

        let protocol = account.protocol();
        let incoming_test = match self.connector.incoming(&account, request.password.clone()) {
            Ok(client) => client.test_connection().await,
            Err(e) => ConnectionTest::failed(e.detail()),
        };
        if let Some(error) = rejection(protocol.label(), &incoming_test, CHECK_CREDENTIALS) {
            warn!(%error, "Incoming server rejected account");
            return Ok(AddAccountResult::Rejected { error });
        }

        let outgoing_test = match self.connector.outgoing(&account, request.password.clone()) {
            Ok(client) => client.test_connection().await,
            Err(e) => ConnectionTest::failed(e.detail()),
        };
        if let Some(error) = rejection("SMTP", &outgoing_test, CHECK_SETTINGS) {
            warn!(%error, "SMTP server rejected account");
            return Ok(AddAccountResult::Rejected { error });
        }

        account.encrypted_password = self.cipher.encrypt(request.password.expose_secret())?;
        self.accounts.insert(&account).await?;

        info!(account_id = %account.id, "Email account added");
        Ok(AddAccountResult::Added {
            account: Box::new(account),
        })
    }

    /// Active accounts of a user, newest first
    #[instrument(skip(self))]
    pub async fn get_accounts(&self, user_id: &UserId) -> Result<Vec<EmailAccount>, ApplicationError> {
        self.accounts.list_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<EmailAccount>, ApplicationError> {
        self.accounts.get(account_id).await
    }

    /// Permanently remove an account and its messages
    #[instrument(skip(self))]
    pub async fn delete_account(&self, account_id: &AccountId) -> bool {
        report("delete_account", self.accounts.delete(account_id).await)
    }

    /// Hide an account from listings while keeping its data
    #[instrument(skip(self))]
    pub async fn deactivate_account(&self, account_id: &AccountId) -> bool {
        report("deactivate_account", self.accounts.set_active(account_id, false).await)
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Fetch one folder and upsert its messages
    ///
    /// Connection and fetch failures are recorded on the account and returned in
    /// the result. A credential that fails to decrypt is returned as `Err`.
    #[instrument(skip(self, options), fields(folder = ?options.folder))]
    pub async fn sync_emails(
        &self,
        account_id: &AccountId,
        options: SyncOptions,
    ) -> Result<SyncResult, ApplicationError> {
        let Some(account) = self.accounts.get(account_id).await? else {
            return Ok(SyncResult::failed(ACCOUNT_NOT_FOUND));
        };
        let password = self.cipher.decrypt(&account.encrypted_password)?;

        let folder = match account.protocol() {
            MailProtocol::Pop3 => INBOX_FOLDER.to_string(),
            MailProtocol::Imap => options.folder.unwrap_or_else(|| INBOX_FOLDER.to_string()),
        };
        let fetch = FetchOptions {
            folder,
            limit: options.limit.unwrap_or(self.limits.default_limit),
            since: options.since,
        };

        let raw = match self.fetch_raw(&account, password, &fetch).await {
            Ok(raw) => raw,
            Err(e) => {
                let error = e.detail();
                warn!(%error, "Sync failed");
                if let Err(store_err) = self.accounts.record_sync_failure(account_id, &error).await {
                    warn!(error = %store_err, "Failed to record sync error");
                }
                return Ok(SyncResult::failed(error));
            },
        };

        let mut synced = 0;
        for message in &raw {
            let normalized = normalize_message(message, account.id, Some(&fetch.folder));
            match self.messages.upsert(&normalized).await {
                Ok(()) => synced += 1,
                Err(e) => warn!(message_id = %normalized.message_id, error = %e, "Failed to store message"),
            }
        }

        if let Err(e) = self.accounts.record_sync_success(account_id, Utc::now()).await {
            warn!(error = %e, "Failed to record sync time");
        }

        if synced > 0 {
            if let Err(e) = self.analysis.analyze_new(account_id, synced).await {
                warn!(error = %e, "Post-sync analysis failed");
            }
        }

        info!(fetched = raw.len(), synced, folder = %fetch.folder, "Sync finished");
        Ok(SyncResult::synced(synced))
    }

    /// Sync every important folder of an account
    ///
    /// POP3 accounts only have `INBOX`. For IMAP, a folder that fails is logged
    /// and left out of the result while the remaining folders still sync.
    #[instrument(skip(self, options))]
    pub async fn sync_all_folders(
        &self,
        account_id: &AccountId,
        options: AllFoldersOptions,
    ) -> Result<FolderSyncResult, ApplicationError> {
        let Some(account) = self.accounts.get(account_id).await? else {
            return Ok(FolderSyncResult {
                error: Some(ACCOUNT_NOT_FOUND.to_string()),
                ..FolderSyncResult::default()
            });
        };

        if account.protocol() == MailProtocol::Pop3 {
            let result = self
                .sync_emails(
                    account_id,
                    SyncOptions {
                        folder: None,
                        limit: options.limit,
                        since: options.since,
                    },
                )
                .await?;
            return Ok(FolderSyncResult {
                synced: result.synced,
                folders: vec![INBOX_FOLDER.to_string()],
                error: result.error,
            });
        }

        let password = self.cipher.decrypt(&account.encrypted_password)?;
        let available = match self.list_folders(&account, password).await {
            Ok(folders) => folders,
            Err(e) => {
                warn!(error = %e, "Folder listing failed");
                return Ok(FolderSyncResult {
                    error: Some(e.detail()),
                    ..FolderSyncResult::default()
                });
            },
        };
        let selected = self.folders.select(&available);
        debug!(available = available.len(), selected = ?selected, "Folders chosen for sync");

        let limit = options.limit.unwrap_or(self.limits.per_folder_limit);
        let mut outcome = FolderSyncResult::default();
        for folder in selected {
            let options = SyncOptions {
                folder: Some(folder.clone()),
                limit: Some(limit),
                since: options.since,
            };
            match self.sync_emails(account_id, options).await {
                Ok(SyncResult { synced, error: None }) => {
                    outcome.synced += synced;
                    outcome.folders.push(folder);
                },
                Ok(SyncResult {
                    error: Some(error), ..
                }) => warn!(%folder, %error, "Folder sync failed, continuing"),
                Err(e) => warn!(%folder, error = %e, "Folder sync failed, continuing"),
            }
        }

        info!(synced = outcome.synced, folders = outcome.folders.len(), "All-folder sync finished");
        Ok(outcome)
    }

    async fn fetch_raw(
        &self,
        account: &EmailAccount,
        password: SecretString,
        options: &FetchOptions,
    ) -> Result<Vec<RawMessage>, ApplicationError> {
        let client = self.connector.incoming(account, password)?;
        let result = match client.connect().await {
            Ok(()) => client.fetch_emails(options).await,
            Err(e) => Err(e),
        };
        if let Err(e) = client.disconnect().await {
            debug!(error = %e, "Disconnect failed");
        }
        result
    }

    async fn list_folders(
        &self,
        account: &EmailAccount,
        password: SecretString,
    ) -> Result<Vec<String>, ApplicationError> {
        let client = self.connector.incoming(account, password)?;
        let result = match client.connect().await {
            Ok(()) => client.list_folders().await,
            Err(e) => Err(e),
        };
        if let Err(e) = client.disconnect().await {
            debug!(error = %e, "Disconnect failed");
        }
        result
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn get_emails(
        &self,
        account_id: &AccountId,
        query: &EmailQuery,
    ) -> Result<Vec<EmailMessage>, ApplicationError> {
        self.messages.query(account_id, query).await
    }

    #[instrument(skip(self))]
    pub async fn get_email(&self, email_id: &EmailId) -> Result<Option<EmailMessage>, ApplicationError> {
        self.messages.get(email_id).await
    }

    /// Send through the account's SMTP server and keep a copy in `Sent`
    #[instrument(skip(self, request), fields(account_id = %request.account_id, recipients = request.to.len()))]
    pub async fn send_email(&self, request: SendEmailRequest) -> Result<SendResult, ApplicationError> {
        let Some(account) = self.accounts.get(&request.account_id).await? else {
            return Ok(SendResult::failed(ACCOUNT_NOT_FOUND));
        };
        if request.to.iter().all(|r| r.trim().is_empty()) {
            return Ok(SendResult::failed("At least one recipient is required"));
        }
        let password = self.cipher.decrypt(&account.encrypted_password)?;

        let email = OutgoingEmail {
            from: account.email_address.clone(),
            from_name: account.display_name.clone(),
            to: request.to,
            cc: request.cc,
            bcc: request.bcc,
            subject: request.subject,
            text: request.body_text,
            html: request.body_html,
            attachments: request.attachments,
        };

        let client = match self.connector.outgoing(&account, password) {
            Ok(client) => client,
            Err(e) => return Ok(SendResult::failed(e.detail())),
        };
        let sent = client.send_email(&email).await;
        if let Err(e) = client.close().await {
            debug!(error = %e, "SMTP close failed");
        }

        let outcome = match sent {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Send failed");
                return Ok(SendResult::failed(e.detail()));
            },
        };

        let mirror = sent_mirror(&account, &email, &outcome.message_id);
        if let Err(e) = self.messages.insert(&mirror).await {
            warn!(error = %e, "Sent message was delivered but not stored");
        }

        info!(message_id = %outcome.message_id, "Email sent");
        Ok(SendResult::sent(outcome.message_id))
    }

    /// Set or clear the read flag
    #[instrument(skip(self))]
    pub async fn mark_as_read(&self, email_id: &EmailId, read: bool) -> bool {
        report("mark_as_read", self.messages.set_read(email_id, read).await)
    }

    #[instrument(skip(self))]
    pub async fn star_email(&self, email_id: &EmailId, starred: bool) -> bool {
        report("star_email", self.messages.set_starred(email_id, starred).await)
    }

    #[instrument(skip(self))]
    pub async fn move_to_trash(&self, email_id: &EmailId) -> bool {
        report("move_to_trash", self.messages.set_trash(email_id, true).await)
    }

    #[instrument(skip(self))]
    pub async fn restore_from_trash(&self, email_id: &EmailId) -> bool {
        report("restore_from_trash", self.messages.set_trash(email_id, false).await)
    }

    /// Permanently delete a stored message
    #[instrument(skip(self))]
    pub async fn delete_email(&self, email_id: &EmailId) -> bool {
        report("delete_email", self.messages.delete(email_id).await)
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self, account_id: &AccountId) -> Result<MailboxStats, ApplicationError> {
        self.messages.stats(account_id).await
    }
}

/// Korean-language rejection message for a failed connection test
fn rejection(label: &str, test: &ConnectionTest, fallback: &str) -> Option<String> {
    if test.success {
        return None;
    }
    let reason = test
        .error
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(fallback);
    Some(format!("{label} 연결 실패: {reason}"))
}

fn report(operation: &str, result: Result<bool, ApplicationError>) -> bool {
    match result {
        Ok(changed) => changed,
        Err(e) => {
            warn!(operation, error = %e, "Store update failed");
            false
        },
    }
}

fn sent_mirror(account: &EmailAccount, email: &OutgoingEmail, message_id: &str) -> EmailMessage {
    let now = Utc::now();
    let mut mirror = EmailMessage::new(account.id, message_id, SENT_FOLDER);
    mirror.subject.clone_from(&email.subject);
    mirror.from_address = account.email_address.to_string();
    mirror.from_name.clone_from(&account.display_name);
    mirror.to_addresses.clone_from(&email.to);
    mirror.cc_addresses.clone_from(&email.cc);
    mirror.bcc_addresses.clone_from(&email.bcc);
    mirror.body_text.clone_from(&email.text);
    mirror.body_html.clone_from(&email.html);
    mirror.is_sent = true;
    mirror.is_read = true;
    mirror.sent_at = Some(now);
    mirror.received_at = now;
    mirror
}
