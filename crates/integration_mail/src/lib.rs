//! Mail protocol clients
//!
//! IMAP and POP3 for retrieval, SMTP for submission. Each client owns at most
//! one server session, opened by `connect` and released by `disconnect`/`close`
//! or when the client is dropped.
//!
//! - [`ImapClient`] wraps the blocking `imap` crate in `spawn_blocking`
//! - [`Pop3Client`] and [`SmtpClient`] speak their line protocols over tokio

mod compose;
mod config;
mod connection;
mod error;
mod imap_client;
mod mime;
mod pop3_client;
mod smtp_client;
mod tls;

pub use compose::{Attachment, Mailbox, OutgoingMessage};
pub use config::{MailServerConfig, MailTimeouts, TlsConfig};
pub use error::MailError;
pub use imap_client::{ImapClient, ImapFetch, ImapMessage, MessageFlags};
pub use mime::{Address, ParsedMessage, parse_message};
pub use pop3_client::{Pop3Client, Pop3Message};
pub use smtp_client::SmtpClient;
pub use tls::build_native_tls_connector;
