//! Async message store using sqlx

use application::{
    error::ApplicationError,
    ports::{EmailQuery, MessageStorePort},
};
use async_trait::async_trait;
use domain::{AccountId, EmailId, EmailMessage, MailboxStats};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::{
    columns::{
        decode_addresses, encode_addresses, format_datetime, parse_datetime,
        parse_optional_datetime, parse_uuid,
    },
    error::map_sqlx_error,
};

const MESSAGE_COLUMNS: &str = "id, account_id, message_id, uid, folder, subject, \
     from_address, from_name, to_addresses, cc_addresses, bcc_addresses, \
     body_text, body_html, is_read, is_starred, is_sent, is_trash, sent_at, received_at";

const INSERT_MESSAGE: &str = "INSERT INTO email_messages (id, account_id, message_id, uid, folder, subject, \
     from_address, from_name, to_addresses, cc_addresses, bcc_addresses, \
     body_text, body_html, is_read, is_starred, is_sent, is_trash, sent_at, received_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)";

/// Star, trash and the sent mark are local state and never cleared by a re-sync.
/// POP3 rows (uid 0) carry no server read flag, so theirs is kept too.
/// Servers strip Bcc, so a stored bcc list survives an empty incoming one.
const UPSERT_CONFLICT: &str = " ON CONFLICT(account_id, message_id) DO UPDATE SET \
     uid = excluded.uid, \
     folder = excluded.folder, \
     subject = excluded.subject, \
     from_address = excluded.from_address, \
     from_name = excluded.from_name, \
     to_addresses = excluded.to_addresses, \
     cc_addresses = excluded.cc_addresses, \
     bcc_addresses = CASE WHEN excluded.bcc_addresses = '[]' \
         THEN email_messages.bcc_addresses ELSE excluded.bcc_addresses END, \
     body_text = excluded.body_text, \
     body_html = excluded.body_html, \
     is_read = CASE WHEN excluded.uid = 0 THEN email_messages.is_read ELSE excluded.is_read END, \
     is_sent = email_messages.is_sent OR excluded.is_sent, \
     sent_at = COALESCE(excluded.sent_at, email_messages.sent_at), \
     received_at = excluded.received_at";

/// Async message store using sqlx
#[derive(Debug, Clone)]
pub struct AsyncMessageStore {
    pool: SqlitePool,
}

impl AsyncMessageStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write(&self, sql: &str, message: &EmailMessage) -> Result<(), ApplicationError> {
        sqlx::query(sql)
            .bind(message.id.to_string())
            .bind(message.account_id.to_string())
            .bind(&message.message_id)
            .bind(i64::from(message.uid))
            .bind(&message.folder)
            .bind(&message.subject)
            .bind(&message.from_address)
            .bind(&message.from_name)
            .bind(encode_addresses(&message.to_addresses)?)
            .bind(encode_addresses(&message.cc_addresses)?)
            .bind(encode_addresses(&message.bcc_addresses)?)
            .bind(&message.body_text)
            .bind(&message.body_html)
            .bind(message.is_read)
            .bind(message.is_starred)
            .bind(message.is_sent)
            .bind(message.is_trash)
            .bind(message.sent_at.as_ref().map(format_datetime))
            .bind(format_datetime(&message.received_at))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn set_flag(
        &self,
        column: &'static str,
        id: &EmailId,
        value: bool,
    ) -> Result<bool, ApplicationError> {
        let result = sqlx::query(&format!(
            "UPDATE email_messages SET {column} = $1 WHERE id = $2"
        ))
        .bind(value)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

/// `%term%` with LIKE wildcards in the term escaped by `\`
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl MessageStorePort for AsyncMessageStore {
    #[instrument(skip(self, message), fields(account_id = %message.account_id, message_id = %message.message_id))]
    async fn upsert(&self, message: &EmailMessage) -> Result<(), ApplicationError> {
        self.write(&format!("{INSERT_MESSAGE}{UPSERT_CONFLICT}"), message)
            .await?;
        debug!("Message upserted");
        Ok(())
    }

    #[instrument(skip(self, message), fields(account_id = %message.account_id))]
    async fn insert(&self, message: &EmailMessage) -> Result<(), ApplicationError> {
        self.write(INSERT_MESSAGE, message).await?;
        debug!("Message inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &EmailId) -> Result<Option<EmailMessage>, ApplicationError> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM email_messages WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(MessageRow::into_message).transpose()
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        account_id: &AccountId,
        query: &EmailQuery,
    ) -> Result<Vec<EmailMessage>, ApplicationError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {MESSAGE_COLUMNS} FROM email_messages WHERE account_id = "
        ));
        builder.push_bind(account_id.to_string());

        if let Some(folder) = &query.folder {
            builder.push(" AND folder = ").push_bind(folder.clone());
        }
        if query.unread_only {
            builder.push(" AND is_read = 0");
        }
        if let Some(in_trash) = query.in_trash {
            builder.push(" AND is_trash = ").push_bind(in_trash);
        }
        if let Some(term) = query.search_term() {
            let pattern = like_pattern(term);
            builder
                .push(" AND (LOWER(subject) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(COALESCE(body_text, '')) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(from_address) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        builder.push(" ORDER BY received_at DESC");
        if let Some(limit) = query.effective_limit() {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
            if let Some(offset) = query.offset {
                builder.push(" OFFSET ").push_bind(i64::from(offset));
            }
        }

        let rows: Vec<MessageRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(count = rows.len(), "Queried messages");
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn set_read(&self, id: &EmailId, read: bool) -> Result<bool, ApplicationError> {
        self.set_flag("is_read", id, read).await
    }

    async fn set_starred(&self, id: &EmailId, starred: bool) -> Result<bool, ApplicationError> {
        self.set_flag("is_starred", id, starred).await
    }

    async fn set_trash(&self, id: &EmailId, trash: bool) -> Result<bool, ApplicationError> {
        self.set_flag("is_trash", id, trash).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &EmailId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM email_messages WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn stats(&self, account_id: &AccountId) -> Result<MailboxStats, ApplicationError> {
        let (total, unread, starred, trash): (i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COALESCE(SUM(CASE WHEN is_trash = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_trash = 0 AND is_read = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_starred = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_trash = 1 THEN 1 ELSE 0 END), 0)
            FROM email_messages WHERE account_id = $1
            ",
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(MailboxStats {
            total: count(total),
            unread: count(unread),
            starred: count(starred),
            trash: count(trash),
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    account_id: String,
    message_id: String,
    uid: i64,
    folder: String,
    subject: String,
    from_address: String,
    from_name: Option<String>,
    to_addresses: String,
    cc_addresses: String,
    bcc_addresses: String,
    body_text: Option<String>,
    body_html: Option<String>,
    is_read: bool,
    is_starred: bool,
    is_sent: bool,
    is_trash: bool,
    sent_at: Option<String>,
    received_at: String,
}

impl MessageRow {
    fn into_message(self) -> Result<EmailMessage, ApplicationError> {
        Ok(EmailMessage {
            id: EmailId::from_uuid(parse_uuid(&self.id)?),
            account_id: AccountId::from_uuid(parse_uuid(&self.account_id)?),
            message_id: self.message_id,
            uid: u32::try_from(self.uid)
                .map_err(|_| ApplicationError::Internal(format!("Invalid uid: {}", self.uid)))?,
            folder: self.folder,
            subject: self.subject,
            from_address: self.from_address,
            from_name: self.from_name,
            to_addresses: decode_addresses(&self.to_addresses),
            cc_addresses: decode_addresses(&self.cc_addresses),
            bcc_addresses: decode_addresses(&self.bcc_addresses),
            body_text: self.body_text,
            body_html: self.body_html,
            is_read: self.is_read,
            is_starred: self.is_starred,
            is_sent: self.is_sent,
            is_trash: self.is_trash,
            sent_at: parse_optional_datetime(self.sent_at.as_deref())?,
            received_at: parse_datetime(&self.received_at)?,
        })
    }
}
