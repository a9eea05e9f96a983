//! POP3 client
//!
//! POP3 has a single mailbox and no server-side flags, so a fetch is just
//! `STAT`, optionally `UIDL`, then `RETR` for the newest messages.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::{
    MailError, MailServerConfig, ParsedMessage,
    connection::{BoxedStream, LineConnection, open, unstuff_line},
    parse_message,
};

/// The only folder a POP3 mailbox has
const POP3_FOLDER: &str = "INBOX";

/// A retrieved POP3 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pop3Message {
    /// Message number within the current session
    pub number: u32,
    /// Server-assigned persistent id from `UIDL`, when supported
    pub unique_id: Option<String>,
    pub size: u64,
    pub parsed: ParsedMessage,
}

type Pop3Connection = LineConnection<BoxedStream>;

/// POP3 client for one account
pub struct Pop3Client {
    config: MailServerConfig,
    connection: Mutex<Option<Pop3Connection>>,
}

impl std::fmt::Debug for Pop3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pop3Client {
    pub fn new(config: MailServerConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    /// Log in and immediately quit
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn test_connection(&self) -> Result<(), MailError> {
        let mut conn = self.login().await?;
        quit(&mut conn).await;
        Ok(())
    }

    /// Open and authenticate a session; no-op when already connected
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn connect(&self) -> Result<(), MailError> {
        let mut slot = self.connection.lock().await;
        if slot.is_none() {
            *slot = Some(self.login().await?);
        }
        Ok(())
    }

    /// Retrieve up to `limit` of the newest messages, newest first
    #[instrument(skip(self))]
    pub async fn fetch(&self, limit: u32) -> Result<Vec<Pop3Message>, MailError> {
        let mut slot = self.connection.lock().await;
        let conn = slot.as_mut().ok_or(MailError::NotConnected)?;

        let count = stat(conn).await?;
        if count == 0 || limit == 0 {
            debug!("POP3 mailbox is empty");
            return Ok(Vec::new());
        }
        let unique_ids = uidl(conn).await;
        let sizes = list(conn).await.unwrap_or_default();

        let first = count.saturating_sub(limit) + 1;
        let mut messages = Vec::with_capacity((count - first + 1) as usize);
        for number in (first..=count).rev() {
            let raw = retr(conn, number).await?;
            let parsed = parse_message(&raw).unwrap_or_else(|e| {
                warn!(number, error = %e, "Unparseable message, keeping headers empty");
                ParsedMessage::default()
            });
            messages.push(Pop3Message {
                number,
                unique_id: unique_ids.get(&number).cloned(),
                size: sizes.get(&number).copied().unwrap_or(raw.len() as u64),
                parsed,
            });
        }
        debug!(count = messages.len(), "Retrieved POP3 messages");
        Ok(messages)
    }

    pub fn list_folders(&self) -> Vec<String> {
        vec![POP3_FOLDER.to_string()]
    }

    /// Send `QUIT`; safe to call when not connected
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<(), MailError> {
        if let Some(mut conn) = self.connection.lock().await.take() {
            quit(&mut conn).await;
        }
        Ok(())
    }

    async fn login(&self) -> Result<Pop3Connection, MailError> {
        self.config.validate()?;
        let stream = open(&self.config).await?;
        let mut conn = LineConnection::new(stream, self.config.timeouts.command);

        let greeting = conn.read_line().await?;
        ok_reply(&greeting, "greeting")?;

        conn.send_line(&format!("USER {}", self.config.username)).await?;
        let reply = conn.read_line().await?;
        if !reply.starts_with("+OK") {
            return Err(MailError::AuthenticationFailed(reply_text(&reply)));
        }

        conn.send_line(&format!("PASS {}", self.config.password())).await?;
        let reply = conn.read_line().await?;
        if !reply.starts_with("+OK") {
            return Err(MailError::AuthenticationFailed(reply_text(&reply)));
        }

        debug!("POP3 login successful");
        Ok(conn)
    }
}

fn ok_reply(reply: &str, context: &str) -> Result<(), MailError> {
    if reply.starts_with("+OK") {
        Ok(())
    } else {
        Err(MailError::Protocol(format!("Unexpected {context} reply: {reply}")))
    }
}

fn reply_text(reply: &str) -> String {
    reply.strip_prefix("-ERR").unwrap_or(reply).trim().to_string()
}

/// Number of messages in the mailbox
async fn stat(conn: &mut Pop3Connection) -> Result<u32, MailError> {
    conn.send_line("STAT").await?;
    let reply = conn.read_line().await?;
    ok_reply(&reply, "STAT")?;
    reply
        .split_whitespace()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| MailError::Protocol(format!("Malformed STAT reply: {reply}")))
}

/// Read the body of a multi-line response up to the `.` terminator
async fn read_multiline(conn: &mut Pop3Connection) -> Result<Vec<u8>, MailError> {
    let mut body = Vec::new();
    loop {
        let line = conn.read_line_bytes().await?;
        match unstuff_line(&line) {
            Some(content) => body.extend_from_slice(content),
            None => return Ok(body),
        }
    }
}

/// Map of message number to a `number value` listing
async fn listing(conn: &mut Pop3Connection, command: &str) -> Result<HashMap<u32, String>, MailError> {
    conn.send_line(command).await?;
    let reply = conn.read_line().await?;
    ok_reply(&reply, command)?;
    let body = read_multiline(conn).await?;
    Ok(String::from_utf8_lossy(&body)
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let number = parts.next()?.parse().ok()?;
            let value = parts.next()?.to_string();
            Some((number, value))
        })
        .collect())
}

/// Persistent ids; empty when the server lacks `UIDL`
async fn uidl(conn: &mut Pop3Connection) -> HashMap<u32, String> {
    listing(conn, "UIDL").await.unwrap_or_else(|e| {
        debug!(error = %e, "UIDL not available");
        HashMap::new()
    })
}

async fn list(conn: &mut Pop3Connection) -> Result<HashMap<u32, u64>, MailError> {
    Ok(listing(conn, "LIST")
        .await?
        .into_iter()
        .filter_map(|(n, size)| size.parse().ok().map(|s| (n, s)))
        .collect())
}

async fn retr(conn: &mut Pop3Connection, number: u32) -> Result<Vec<u8>, MailError> {
    conn.send_line(&format!("RETR {number}")).await?;
    let reply = conn.read_line().await?;
    ok_reply(&reply, "RETR")?;
    read_multiline(conn).await
}

async fn quit(conn: &mut Pop3Connection) {
    if conn.send_line("QUIT").await.is_ok() {
        conn.read_line().await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_strips_status() {
        assert_eq!(reply_text("-ERR invalid password"), "invalid password");
        assert_eq!(reply_text("garbage"), "garbage");
    }

    #[test]
    fn ok_reply_requires_positive_status() {
        assert!(ok_reply("+OK ready", "greeting").is_ok());
        assert!(matches!(
            ok_reply("-ERR busy", "greeting"),
            Err(MailError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn fetch_without_session_is_an_error() {
        let client = Pop3Client::new(MailServerConfig::new(
            "127.0.0.1",
            110,
            false,
            "ceo@startup.io",
            secrecy::SecretString::from("pw"),
        ));
        assert!(matches!(client.fetch(10).await, Err(MailError::NotConnected)));
        assert_eq!(client.list_folders(), vec!["INBOX".to_string()]);
    }
}
