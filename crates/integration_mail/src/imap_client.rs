//! IMAP client
//!
//! Uses the synchronous `imap` crate wrapped in `spawn_blocking`. The session
//! lives between `connect` and `disconnect` so one login serves a whole sync.

use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
};

use chrono::{DateTime, NaiveDate, Utc};
use imap::{Session, types::Flag};
use parking_lot::Mutex;
use tracing::{debug, error, instrument, warn};

use crate::{MailError, MailServerConfig, ParsedMessage, build_native_tls_connector, parse_message};

/// Plaintext or TLS socket under an IMAP session
#[derive(Debug)]
enum ImapStream {
    Plain(TcpStream),
    Tls(Box<native_tls::TlsStream<TcpStream>>),
}

impl Read for ImapStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for ImapStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

type ImapSession = Session<ImapStream>;

/// Which messages to fetch from a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapFetch {
    pub folder: String,
    pub limit: u32,
    /// Server-side `SINCE` filter (day granularity)
    pub since: Option<NaiveDate>,
}

/// IMAP system flags of a fetched message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    pub seen: bool,
    pub flagged: bool,
    pub answered: bool,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapMessage {
    pub uid: u32,
    pub flags: MessageFlags,
    pub internal_date: Option<DateTime<Utc>>,
    pub parsed: ParsedMessage,
}

/// IMAP client for one account
pub struct ImapClient {
    config: MailServerConfig,
    session: Arc<Mutex<Option<ImapSession>>>,
}

impl std::fmt::Debug for ImapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ImapClient {
    pub fn new(config: MailServerConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Log in and immediately log out again
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn test_connection(&self) -> Result<(), MailError> {
        let config = self.config.clone();
        blocking(move || {
            let mut session = Self::connect_sync(&config)?;
            session.logout().ok();
            Ok(())
        })
        .await
    }

    /// Open and authenticate a session; no-op when already connected
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn connect(&self) -> Result<(), MailError> {
        if self.is_connected() {
            return Ok(());
        }
        let config = self.config.clone();
        let slot = Arc::clone(&self.session);
        blocking(move || {
            let session = Self::connect_sync(&config)?;
            *slot.lock() = Some(session);
            Ok(())
        })
        .await
    }

    /// Fetch the newest messages of a folder, newest first
    ///
    /// Bodies are fetched with `BODY.PEEK[]` so the `\Seen` flag is not set.
    #[instrument(skip(self))]
    pub async fn fetch(&self, request: ImapFetch) -> Result<Vec<ImapMessage>, MailError> {
        let slot = Arc::clone(&self.session);
        blocking(move || {
            let mut guard = slot.lock();
            let session = guard.as_mut().ok_or(MailError::NotConnected)?;
            Self::fetch_sync(session, &request)
        })
        .await
    }

    /// Names of all folders
    #[instrument(skip(self))]
    pub async fn list_folders(&self) -> Result<Vec<String>, MailError> {
        let slot = Arc::clone(&self.session);
        blocking(move || {
            let mut guard = slot.lock();
            let session = guard.as_mut().ok_or(MailError::NotConnected)?;
            let names = session
                .list(Some(""), Some("*"))
                .map_err(|e| MailError::Protocol(format!("LIST command failed: {e}")))?;
            Ok(names.iter().map(|mb| mb.name().to_string()).collect())
        })
        .await
    }

    /// Log out; safe to call when not connected
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<(), MailError> {
        let Some(mut session) = self.session.lock().take() else {
            return Ok(());
        };
        blocking(move || {
            session
                .logout()
                .map_err(|e| MailError::Protocol(format!("LOGOUT failed: {e}")))
        })
        .await
    }

    fn connect_sync(config: &MailServerConfig) -> Result<ImapSession, MailError> {
        config.validate()?;
        let addr = config.address();
        debug!(addr = %addr, secure = config.secure, "Connecting to IMAP server");

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| MailError::ConnectionFailed(format!("Cannot resolve {addr}: {e}")))?
            .next()
            .ok_or_else(|| MailError::ConnectionFailed(format!("No address for {addr}")))?;
        let tcp = TcpStream::connect_timeout(&socket_addr, config.timeouts.connect).map_err(|e| {
            error!(error = %e, "Failed to connect to IMAP server");
            if e.kind() == io::ErrorKind::TimedOut {
                MailError::Timeout(format!("connecting to {addr}"))
            } else {
                MailError::ConnectionFailed(format!("TCP connection failed: {e}"))
            }
        })?;
        tcp.set_read_timeout(Some(config.timeouts.command))
            .and_then(|()| tcp.set_write_timeout(Some(config.timeouts.command)))
            .map_err(|e| MailError::ConnectionFailed(format!("Socket setup failed: {e}")))?;

        let stream = if config.secure {
            let tls = build_native_tls_connector(&config.tls)?;
            let tls_stream = tls.connect(&config.host, tcp).map_err(|e| {
                error!(error = %e, "TLS handshake failed");
                MailError::Tls(format!("TLS handshake failed: {e}"))
            })?;
            ImapStream::Tls(Box::new(tls_stream))
        } else {
            ImapStream::Plain(tcp)
        };

        let client = imap::Client::new(stream);
        let session = client
            .login(&config.username, config.password())
            .map_err(|e| {
                error!(error = ?e.0, "IMAP login failed");
                MailError::AuthenticationFailed(e.0.to_string())
            })?;

        debug!("IMAP login successful");
        Ok(session)
    }

    fn fetch_sync(session: &mut ImapSession, request: &ImapFetch) -> Result<Vec<ImapMessage>, MailError> {
        let mailbox = session.select(&request.folder).map_err(|e| match e {
            imap::Error::No(_) => MailError::MailboxNotFound(request.folder.clone()),
            other => MailError::Protocol(format!("Failed to select {}: {other}", request.folder)),
        })?;

        if mailbox.exists == 0 || request.limit == 0 {
            debug!(folder = %request.folder, "Nothing to fetch");
            return Ok(Vec::new());
        }

        let query = "(UID FLAGS INTERNALDATE BODY.PEEK[])";
        let fetches = if let Some(since) = request.since {
            let uids: Vec<u32> = session
                .uid_search(since_criteria(since))
                .map_err(|e| MailError::Protocol(format!("UID SEARCH failed: {e}")))?
                .into_iter()
                .collect();
            let Some(set) = newest_uid_set(uids, request.limit) else {
                return Ok(Vec::new());
            };
            debug!(folder = %request.folder, uids = %set, "Fetching by UID");
            session
                .uid_fetch(&set, query)
                .map_err(|e| MailError::Protocol(format!("UID FETCH failed: {e}")))?
        } else {
            let range = sequence_range(mailbox.exists, request.limit);
            debug!(folder = %request.folder, range = %range, "Fetching by sequence");
            session
                .fetch(&range, query)
                .map_err(|e| MailError::Protocol(format!("FETCH failed: {e}")))?
        };

        let mut messages: Vec<ImapMessage> = fetches.iter().filter_map(Self::parse_fetch).collect();
        messages.sort_by(|a, b| b.uid.cmp(&a.uid));
        Ok(messages)
    }

    fn parse_fetch(fetch: &imap::types::Fetch) -> Option<ImapMessage> {
        let uid = fetch.uid?;
        let parsed = match fetch.body().map(parse_message) {
            Some(Ok(parsed)) => parsed,
            Some(Err(e)) => {
                warn!(uid, error = %e, "Unparseable message, keeping headers empty");
                ParsedMessage::default()
            },
            None => ParsedMessage::default(),
        };

        let mut flags = MessageFlags::default();
        for flag in fetch.flags() {
            match flag {
                Flag::Seen => flags.seen = true,
                Flag::Flagged => flags.flagged = true,
                Flag::Answered => flags.answered = true,
                Flag::Draft => flags.draft = true,
                _ => {},
            }
        }

        Some(ImapMessage {
            uid,
            flags,
            internal_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
            parsed,
        })
    }
}

impl Drop for ImapClient {
    /// Log out a session the caller forgot to close
    fn drop(&mut self) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        debug!("Logging out IMAP session on drop");
        if tokio::runtime::Handle::try_current().is_ok() {
            drop(tokio::task::spawn_blocking(move || session.logout().ok()));
        } else {
            session.logout().ok();
        }
    }
}

/// Sequence set covering the newest `limit` of `exists` messages
fn sequence_range(exists: u32, limit: u32) -> String {
    let start = exists.saturating_sub(limit) + 1;
    format!("{start}:{exists}")
}

fn since_criteria(since: NaiveDate) -> String {
    format!("SINCE {}", since.format("%d-%b-%Y"))
}

/// Comma-joined set of the `limit` highest UIDs, `None` when nothing matched
fn newest_uid_set(mut uids: Vec<u32>, limit: u32) -> Option<String> {
    if uids.is_empty() || limit == 0 {
        return None;
    }
    uids.sort_unstable();
    let newest = &uids[uids.len().saturating_sub(limit as usize)..];
    Some(
        newest
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

async fn blocking<T, F>(f: F) -> Result<T, MailError>
where
    F: FnOnce() -> Result<T, MailError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MailError::Protocol(format!("Task join error: {e}")))?
}
