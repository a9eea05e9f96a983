//! Async account store using sqlx
//!
//! The incoming server lives in the `imap_*` columns for both IMAP and POP3
//! accounts; the provider decides how it is spoken to.

use application::{error::ApplicationError, ports::AccountStorePort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    AccountId, EmailAccount, EmailAddress, EmailProvider, ServerEndpoint, TeamId, UserId,
};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::{
    columns::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid},
    error::map_sqlx_error,
};

const ACCOUNT_COLUMNS: &str = "id, user_id, team_id, email_address, provider, \
     imap_host, imap_port, imap_secure, smtp_host, smtp_port, smtp_secure, \
     display_name, encrypted_password, is_active, last_sync_at, sync_error, \
     created_at, updated_at";

/// Async account store using sqlx
#[derive(Debug, Clone)]
pub struct AsyncAccountStore {
    pool: SqlitePool,
}

impl AsyncAccountStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn update_flag(&self, id: &AccountId, active: bool) -> Result<bool, ApplicationError> {
        let result =
            sqlx::query("UPDATE email_accounts SET is_active = $1, updated_at = $2 WHERE id = $3")
                .bind(active)
                .bind(format_datetime(&Utc::now()))
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccountStorePort for AsyncAccountStore {
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn insert(&self, account: &EmailAccount) -> Result<(), ApplicationError> {
        sqlx::query(&format!(
            "INSERT INTO email_accounts ({ACCOUNT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(account.team_id.map(|t| t.to_string()))
        .bind(account.email_address.as_str())
        .bind(account.provider.as_str())
        .bind(&account.incoming.host)
        .bind(i64::from(account.incoming.port))
        .bind(account.incoming.secure)
        .bind(&account.outgoing.host)
        .bind(i64::from(account.outgoing.port))
        .bind(account.outgoing.secure)
        .bind(&account.display_name)
        .bind(&account.encrypted_password)
        .bind(account.is_active)
        .bind(account.last_sync_at.as_ref().map(format_datetime))
        .bind(&account.sync_error)
        .bind(format_datetime(&account.created_at))
        .bind(format_datetime(&account.updated_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!("Account inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &AccountId) -> Result<Option<EmailAccount>, ApplicationError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM email_accounts WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(AccountRow::into_account).transpose()
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EmailAccount>, ApplicationError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM email_accounts \
             WHERE user_id = $1 AND is_active = 1 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(count = rows.len(), "Listed accounts");
        rows.into_iter().map(AccountRow::into_account).collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &AccountId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM email_accounts WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: &AccountId, active: bool) -> Result<bool, ApplicationError> {
        self.update_flag(id, active).await
    }

    #[instrument(skip(self))]
    async fn record_sync_success(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let at = format_datetime(&at);
        sqlx::query(
            "UPDATE email_accounts SET last_sync_at = $1, sync_error = NULL, updated_at = $1 \
             WHERE id = $2",
        )
        .bind(&at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_sync_failure(
        &self,
        id: &AccountId,
        error: &str,
    ) -> Result<(), ApplicationError> {
        sqlx::query("UPDATE email_accounts SET sync_error = $1, updated_at = $2 WHERE id = $3")
            .bind(error)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    user_id: String,
    team_id: Option<String>,
    email_address: String,
    provider: String,
    imap_host: String,
    imap_port: i64,
    imap_secure: bool,
    smtp_host: String,
    smtp_port: i64,
    smtp_secure: bool,
    display_name: Option<String>,
    encrypted_password: String,
    is_active: bool,
    last_sync_at: Option<String>,
    sync_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn into_account(self) -> Result<EmailAccount, ApplicationError> {
        Ok(EmailAccount {
            id: AccountId::from_uuid(parse_uuid(&self.id)?),
            user_id: UserId::from_uuid(parse_uuid(&self.user_id)?),
            team_id: self
                .team_id
                .as_deref()
                .map(|t| parse_uuid(t).map(TeamId::from_uuid))
                .transpose()?,
            email_address: EmailAddress::new(self.email_address)
                .map_err(|e| ApplicationError::Internal(format!("Stored address invalid: {e}")))?,
            provider: self
                .provider
                .parse::<EmailProvider>()
                .map_err(|e| ApplicationError::Internal(format!("Stored provider invalid: {e}")))?,
            incoming: ServerEndpoint::new(self.imap_host, parse_port(self.imap_port)?, self.imap_secure),
            outgoing: ServerEndpoint::new(self.smtp_host, parse_port(self.smtp_port)?, self.smtp_secure),
            display_name: self.display_name,
            encrypted_password: self.encrypted_password,
            is_active: self.is_active,
            last_sync_at: parse_optional_datetime(self.last_sync_at.as_deref())?,
            sync_error: self.sync_error,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_port(port: i64) -> Result<u16, ApplicationError> {
    u16::try_from(port).map_err(|_| ApplicationError::Internal(format!("Invalid port: {port}")))
}
