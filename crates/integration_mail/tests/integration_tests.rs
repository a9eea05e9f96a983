//! Integration tests for the mail protocol clients
//!
//! Tests cover:
//! - POP3 login, retrieval order, UIDL and dot-unstuffing
//! - SMTP greeting, authentication, envelope and DATA framing
//! - Authentication failures surfacing as `MailError::AuthenticationFailed`
//!
//! The servers are scripted fakes on a local plaintext socket.

#![allow(
    clippy::redundant_clone,
    clippy::implicit_clone,
    clippy::panic,
    clippy::missing_const_for_fn
)]

use integration_mail::{
    Attachment, MailError, MailServerConfig, Mailbox, OutgoingMessage, Pop3Client, SmtpClient,
    TlsConfig,
};
use secrecy::SecretString;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

fn config(port: u16, password: &str) -> MailServerConfig {
    MailServerConfig::new(
        "127.0.0.1",
        port,
        false,
        "ceo@startup.io",
        SecretString::from(password.to_string()),
    )
}

/// The fake SMTP server offers no STARTTLS, so plaintext AUTH must be allowed
fn smtp_config(port: u16, password: &str) -> MailServerConfig {
    config(port, password).with_tls(TlsConfig {
        allow_plaintext_auth: true,
        ..TlsConfig::default()
    })
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Write a reply; the client may already have hung up after QUIT
async fn reply(stream: &mut BufReader<TcpStream>, text: &str) {
    stream.get_mut().write_all(text.as_bytes()).await.ok();
}

async fn next_line(stream: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    let read = stream.read_line(&mut line).await.ok()?;
    (read > 0).then(|| line.trim_end().to_string())
}

// ============================================================================
// Fake POP3 server
// ============================================================================

fn pop3_message(n: u32) -> String {
    format!(
        "Message-ID: <msg-{n}@fund.com>\r\n\
         From: \"Investor {n}\" <investor{n}@fund.com>\r\n\
         To: ceo@startup.io\r\n\
         Subject: Update {n}\r\n\
         Date: Mon, 19 Oct 2026 0{n}:00:00 +0000\r\n\
         \r\n\
         Line one\r\n\
         ..hidden\r\n"
    )
}

/// Serves three messages; accepts only the password `secret`
fn spawn_pop3(listener: TcpListener) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(socket);
        let mut commands = Vec::new();
        reply(&mut stream, "+OK POP3 ready\r\n").await;

        while let Some(line) = next_line(&mut stream).await {
            let verb = line.split(' ').next().unwrap_or_default().to_string();
            commands.push(verb.clone());
            match verb.as_str() {
                "USER" => reply(&mut stream, "+OK\r\n").await,
                "PASS" if line == "PASS secret" => reply(&mut stream, "+OK logged in\r\n").await,
                "PASS" => {
                    reply(&mut stream, "-ERR invalid password\r\n").await;
                    break;
                },
                "STAT" => reply(&mut stream, "+OK 3 900\r\n").await,
                "UIDL" => reply(&mut stream, "+OK\r\n1 uid-a\r\n2 uid-b\r\n3 uid-c\r\n.\r\n").await,
                "LIST" => reply(&mut stream, "+OK\r\n1 300\r\n2 310\r\n3 320\r\n.\r\n").await,
                "RETR" => {
                    let n: u32 = line[5..].parse().unwrap();
                    reply(&mut stream, &format!("+OK\r\n{}.\r\n", pop3_message(n))).await;
                },
                "QUIT" => {
                    reply(&mut stream, "+OK bye\r\n").await;
                    break;
                },
                _ => reply(&mut stream, "-ERR unknown\r\n").await,
            }
        }
        commands
    })
}

mod pop3_tests {
    use super::*;

    #[tokio::test]
    async fn fetch_returns_newest_messages_first() {
        let (listener, port) = bind().await;
        let server = spawn_pop3(listener);

        let client = Pop3Client::new(config(port, "secret"));
        client.connect().await.unwrap();
        let messages = client.fetch(2).await.unwrap();
        client.disconnect().await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].number, 3);
        assert_eq!(messages[1].number, 2);
        assert_eq!(messages[0].unique_id.as_deref(), Some("uid-c"));
        assert_eq!(messages[0].size, 320);
        assert_eq!(messages[0].parsed.subject.as_deref(), Some("Update 3"));
        assert_eq!(messages[0].parsed.from[0].address, "investor3@fund.com");

        let commands = server.await.unwrap();
        assert_eq!(commands.iter().filter(|c| *c == "RETR").count(), 2);
        assert_eq!(commands.last().map(String::as_str), Some("QUIT"));
    }

    #[tokio::test]
    async fn retrieved_body_is_unstuffed() {
        let (listener, port) = bind().await;
        let _server = spawn_pop3(listener);

        let client = Pop3Client::new(config(port, "secret"));
        client.connect().await.unwrap();
        let messages = client.fetch(1).await.unwrap();

        let text = messages[0].parsed.text.clone().unwrap();
        assert!(text.contains(".hidden"));
        assert!(!text.contains("..hidden"));
    }

    #[tokio::test]
    async fn wrong_password_is_an_authentication_failure() {
        let (listener, port) = bind().await;
        let _server = spawn_pop3(listener);

        let client = Pop3Client::new(config(port, "wrong"));
        let err = client.test_connection().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("invalid password"));
    }

    #[tokio::test]
    async fn test_connection_logs_in_and_quits() {
        let (listener, port) = bind().await;
        let server = spawn_pop3(listener);

        Pop3Client::new(config(port, "secret"))
            .test_connection()
            .await
            .unwrap();

        let commands = server.await.unwrap();
        assert_eq!(commands, vec!["USER", "PASS", "QUIT"]);
    }
}

// ============================================================================
// Fake SMTP server
// ============================================================================

#[derive(Debug, Default)]
struct SmtpTranscript {
    commands: Vec<String>,
    data: String,
}

/// Plaintext submission server advertising `auth`; accepts password `secret`
fn spawn_smtp(listener: TcpListener, auth: &'static str) -> JoinHandle<SmtpTranscript> {
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(socket);
        let mut transcript = SmtpTranscript::default();
        let plain_ok = base64_encode("\0ceo@startup.io\0secret");
        reply(&mut stream, "220 smtp.startup.io ESMTP\r\n").await;

        while let Some(line) = next_line(&mut stream).await {
            transcript.commands.push(line.clone());
            if line.starts_with("EHLO") {
                let caps = format!("250-smtp.startup.io\r\n250-PIPELINING\r\n250 {auth}\r\n");
                reply(&mut stream, &caps).await;
            } else if line.starts_with("AUTH PLAIN") {
                if line.ends_with(&plain_ok) {
                    reply(&mut stream, "235 2.7.0 Authentication successful\r\n").await;
                } else {
                    reply(&mut stream, "535 5.7.8 Bad credentials\r\n").await;
                }
            } else if line == "AUTH LOGIN" {
                reply(&mut stream, "334 VXNlcm5hbWU6\r\n").await;
                let _user = next_line(&mut stream).await;
                reply(&mut stream, "334 UGFzc3dvcmQ6\r\n").await;
                let pass = next_line(&mut stream).await.unwrap_or_default();
                if pass == base64_encode("secret") {
                    reply(&mut stream, "235 ok\r\n").await;
                } else {
                    reply(&mut stream, "535 no\r\n").await;
                }
            } else if line.starts_with("MAIL FROM") || line.starts_with("RCPT TO") {
                reply(&mut stream, "250 OK\r\n").await;
            } else if line == "DATA" {
                reply(&mut stream, "354 End data with <CR><LF>.<CR><LF>\r\n").await;
                while let Some(data_line) = next_line(&mut stream).await {
                    if data_line == "." {
                        break;
                    }
                    transcript.data.push_str(&data_line);
                    transcript.data.push('\n');
                }
                reply(&mut stream, "250 OK queued\r\n").await;
            } else if line == "QUIT" {
                reply(&mut stream, "221 bye\r\n").await;
                break;
            } else {
                reply(&mut stream, "502 unknown\r\n").await;
            }
        }
        transcript
    })
}

fn base64_encode(value: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(value)
}

fn message() -> OutgoingMessage {
    OutgoingMessage {
        from: Mailbox {
            address: "ceo@startup.io".to_string(),
            name: Some("Startup CEO".to_string()),
        },
        to: vec!["investor@fund.com".to_string()],
        cc: vec!["cfo@startup.io".to_string()],
        bcc: vec!["board@startup.io".to_string()],
        subject: "Q3 numbers".to_string(),
        text: Some("Revenue is up.\n.\nSee attached.".to_string()),
        html: None,
        attachments: Vec::new(),
    }
}

mod smtp_tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_every_recipient() {
        let (listener, port) = bind().await;
        let server = spawn_smtp(listener, "AUTH PLAIN LOGIN");

        let message_id = SmtpClient::new(smtp_config(port, "secret"))
            .send(&message())
            .await
            .unwrap();

        let transcript = server.await.unwrap();
        assert!(message_id.ends_with("@startup.io"));
        assert!(transcript.commands.contains(&"MAIL FROM:<ceo@startup.io>".to_string()));
        for rcpt in ["investor@fund.com", "cfo@startup.io", "board@startup.io"] {
            assert!(transcript.commands.contains(&format!("RCPT TO:<{rcpt}>")));
        }
        assert!(transcript.data.contains(&format!("Message-ID: <{message_id}>")));
        assert!(transcript.data.contains("Subject: Q3 numbers"));
        assert!(!transcript.data.contains("board@startup.io"));
        assert_eq!(transcript.commands.last().map(String::as_str), Some("QUIT"));
    }

    #[tokio::test]
    async fn lone_dot_in_body_is_stuffed() {
        let (listener, port) = bind().await;
        let server = spawn_smtp(listener, "AUTH PLAIN");

        SmtpClient::new(smtp_config(port, "secret"))
            .send(&message())
            .await
            .unwrap();

        let transcript = server.await.unwrap();
        assert!(transcript.data.contains("\n..\n"));
        assert!(transcript.data.contains("See attached."));
    }

    #[tokio::test]
    async fn login_mechanism_is_used_when_plain_is_absent() {
        let (listener, port) = bind().await;
        let server = spawn_smtp(listener, "AUTH LOGIN");

        SmtpClient::new(smtp_config(port, "secret"))
            .test_connection()
            .await
            .unwrap();

        let transcript = server.await.unwrap();
        assert!(transcript.commands.contains(&"AUTH LOGIN".to_string()));
    }

    #[tokio::test]
    async fn rejected_credentials_fail_authentication() {
        let (listener, port) = bind().await;
        let _server = spawn_smtp(listener, "AUTH PLAIN");

        let err = SmtpClient::new(smtp_config(port, "wrong"))
            .send(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn attachments_are_sent_as_multipart() {
        let (listener, port) = bind().await;
        let server = spawn_smtp(listener, "AUTH PLAIN");

        let mut with_attachment = message();
        with_attachment.attachments.push(Attachment {
            filename: "deck.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.7".to_vec(),
        });
        SmtpClient::new(smtp_config(port, "secret"))
            .send(&with_attachment)
            .await
            .unwrap();

        let transcript = server.await.unwrap();
        assert!(transcript.data.contains("multipart/mixed"));
        assert!(transcript.data.contains("deck.pdf"));
    }

    #[tokio::test]
    async fn plaintext_auth_is_refused_without_opt_in() {
        let (listener, port) = bind().await;
        let server = spawn_smtp(listener, "AUTH PLAIN");

        let err = SmtpClient::new(config(port, "secret"))
            .send(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Tls(_)));

        let transcript = server.await.unwrap();
        assert!(transcript.commands.iter().all(|c| !c.starts_with("AUTH")));
        assert!(transcript.data.is_empty());
    }
}
