//! SMTP submission client
//!
//! Each send opens its own session: implicit TLS when the endpoint is secure,
//! otherwise plaintext upgraded with STARTTLS when the server offers it.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use crate::{
    MailError, MailServerConfig, OutgoingMessage,
    connection::{BoxedStream, LineConnection, open, stuff_data, upgrade_tls},
};

type SmtpConnection = LineConnection<BoxedStream>;

/// A complete, possibly multi-line, SMTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    const fn is_positive(&self) -> bool {
        self.code >= 200 && self.code < 400
    }

    fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Whether an EHLO reply advertises `keyword` (case-insensitive)
    fn advertises(&self, keyword: &str) -> bool {
        self.lines.iter().skip(1).any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
        })
    }

    /// SASL mechanisms listed on the `AUTH` line
    fn auth_mechanisms(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                words
                    .next()
                    .filter(|k| k.eq_ignore_ascii_case("AUTH"))
                    .map(|_| words.map(str::to_ascii_uppercase).collect::<Vec<_>>())
            })
            .flatten()
            .collect()
    }
}

/// SMTP client for one account
#[derive(Debug, Clone)]
pub struct SmtpClient {
    config: MailServerConfig,
}

impl SmtpClient {
    pub const fn new(config: MailServerConfig) -> Self {
        Self { config }
    }

    /// Authenticate and quit without sending anything
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn test_connection(&self) -> Result<(), MailError> {
        let mut conn = self.session().await?;
        conn.send_line("QUIT").await.ok();
        Ok(())
    }

    /// Submit a message; returns the generated Message-ID without angle brackets
    #[instrument(skip(self, message), fields(host = %self.config.host, subject = %message.subject))]
    pub async fn send(&self, message: &OutgoingMessage) -> Result<String, MailError> {
        message.validate()?;
        let message_id = generate_message_id(&message.from.address);
        let content = message.render(&message_id, Utc::now());

        let mut conn = self.session().await?;
        command(&mut conn, &format!("MAIL FROM:<{}>", message.from.address), 250).await?;
        for recipient in message.recipients() {
            command(&mut conn, &format!("RCPT TO:<{recipient}>"), 250)
                .await
                .inspect_err(|e| error!(recipient, error = %e, "Recipient rejected"))?;
        }
        command(&mut conn, "DATA", 354).await?;
        conn.write_all(stuff_data(&content).as_bytes()).await?;
        conn.write_all(b".\r\n").await?;
        let reply = read_reply(&mut conn).await?;
        if reply.code != 250 {
            return Err(MailError::Protocol(format!(
                "Message rejected: {} {}",
                reply.code,
                reply.text()
            )));
        }

        // The server may close right away, so the QUIT reply is not awaited
        conn.send_line("QUIT").await.ok();
        debug!(message_id = %message_id, "Email sent successfully");
        Ok(message_id)
    }

    /// Sessions are per-send, so there is nothing to release
    pub fn close(&self) {
        debug!("SMTP client closed");
    }

    /// Greeting, EHLO, optional STARTTLS and authentication
    async fn session(&self) -> Result<SmtpConnection, MailError> {
        self.config.validate()?;
        let stream = open(&self.config).await?;
        let mut conn = LineConnection::new(stream, self.config.timeouts.command);

        let greeting = read_reply(&mut conn).await?;
        if greeting.code != 220 {
            return Err(MailError::Protocol(format!("Unexpected greeting: {}", greeting.text())));
        }

        let mut capabilities = ehlo(&mut conn).await?;
        if !self.config.secure {
            if capabilities.advertises("STARTTLS") {
                command(&mut conn, "STARTTLS", 220).await?;
                let tls = upgrade_tls(&self.config, conn.into_inner()).await?;
                conn = LineConnection::new(Box::new(tls) as BoxedStream, self.config.timeouts.command);
                capabilities = ehlo(&mut conn).await?;
            } else if self.config.tls.allow_plaintext_auth {
                warn!(host = %self.config.host, "Server does not offer STARTTLS, continuing in plaintext");
            } else {
                return Err(MailError::Tls(format!(
                    "{} does not offer STARTTLS; refusing to send credentials in plaintext",
                    self.config.host
                )));
            }
        }

        self.authenticate(&mut conn, &capabilities).await?;
        Ok(conn)
    }

    async fn authenticate(&self, conn: &mut SmtpConnection, capabilities: &Reply) -> Result<(), MailError> {
        let mechanisms = capabilities.auth_mechanisms();
        let use_login = !mechanisms.is_empty()
            && !mechanisms.iter().any(|m| m == "PLAIN")
            && mechanisms.iter().any(|m| m == "LOGIN");

        let reply = if use_login {
            let challenge = auth_step(conn, "AUTH LOGIN").await?;
            expect_challenge(&challenge)?;
            let challenge = auth_step(conn, &STANDARD.encode(&self.config.username)).await?;
            expect_challenge(&challenge)?;
            auth_step(conn, &STANDARD.encode(self.config.password())).await?
        } else {
            let token = STANDARD.encode(format!("\0{}\0{}", self.config.username, self.config.password()));
            auth_step(conn, &format!("AUTH PLAIN {token}")).await?
        };

        if reply.code == 235 {
            debug!("SMTP authentication successful");
            Ok(())
        } else {
            error!(code = reply.code, "SMTP authentication failed");
            Err(MailError::AuthenticationFailed(reply.text()))
        }
    }
}

async fn auth_step(conn: &mut SmtpConnection, line: &str) -> Result<Reply, MailError> {
    conn.send_line(line).await?;
    read_reply(conn).await
}

fn expect_challenge(reply: &Reply) -> Result<(), MailError> {
    if reply.code == 334 {
        Ok(())
    } else {
        Err(MailError::AuthenticationFailed(reply.text()))
    }
}

async fn ehlo(conn: &mut SmtpConnection) -> Result<Reply, MailError> {
    let hostname = hostname::get().map_or_else(|_| "localhost".to_string(), |h| h.to_string_lossy().to_string());
    conn.send_line(&format!("EHLO {hostname}")).await?;
    let reply = read_reply(conn).await?;
    if reply.is_positive() {
        Ok(reply)
    } else {
        Err(MailError::Protocol(format!("EHLO rejected: {}", reply.text())))
    }
}

async fn command(conn: &mut SmtpConnection, line: &str, expected: u16) -> Result<Reply, MailError> {
    conn.send_line(line).await?;
    let reply = read_reply(conn).await?;
    if reply.code == expected {
        Ok(reply)
    } else {
        let verb = line.split([' ', ':']).next().unwrap_or(line);
        Err(MailError::Protocol(format!(
            "{verb}: expected {expected}, got {} {}",
            reply.code,
            reply.text()
        )))
    }
}

/// Read lines until one without a `-` after the code
async fn read_reply(conn: &mut SmtpConnection) -> Result<Reply, MailError> {
    let mut lines = Vec::new();
    loop {
        let line = conn.read_line().await?;
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| MailError::Protocol(format!("Malformed reply: {line}")))?;
        let more = line.as_bytes().get(3) == Some(&b'-');
        lines.push(line.get(4..).unwrap_or_default().to_string());
        if !more {
            return Ok(Reply { code, lines });
        }
    }
}

fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    format!("{}.{}@{domain}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4())
}
