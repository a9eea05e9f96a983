//! Outgoing message rendering (RFC 5322 + MIME)

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::MailError;

const BASE64_LINE: usize = 76;
/// Raw bytes per RFC 2047 encoded word, keeps each word under 75 chars
const ENCODED_WORD_BYTES: usize = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub address: String,
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    fn header_value(&self) -> String {
        match self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) if name.is_ascii() => {
                format!("\"{}\" <{}>", single_line(name).replace('"', "'"), self.address)
            },
            Some(name) => format!("{} <{}>", encode_header(name), self.address),
            None => self.address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message ready for SMTP submission
///
/// `bcc` recipients receive the message but never appear in its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: Mailbox,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Envelope recipients: to, cc and bcc, blanks removed
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), MailError> {
        check_address(&self.from.address)?;
        let recipients = self.recipients();
        if recipients.is_empty() {
            return Err(MailError::InvalidAddress("No recipients".to_string()));
        }
        recipients.into_iter().try_for_each(check_address)
    }

    /// Render headers and body with CRLF line endings, without dot-stuffing
    pub(crate) fn render(&self, message_id: &str, date: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.from.header_value()));
        out.push_str(&format!("To: {}\r\n", join_clean(&self.to)));
        if self.cc.iter().any(|c| !c.trim().is_empty()) {
            out.push_str(&format!("Cc: {}\r\n", join_clean(&self.cc)));
        }
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str(&format!("Date: {}\r\n", date.to_rfc2822()));
        out.push_str(&format!("Message-ID: <{message_id}>\r\n"));
        out.push_str("MIME-Version: 1.0\r\n");

        let body = self.body_part();
        if self.attachments.is_empty() {
            out.push_str(&body);
            return out;
        }

        let boundary = boundary();
        out.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
        ));
        out.push_str(&format!("--{boundary}\r\n{body}\r\n"));
        for attachment in &self.attachments {
            out.push_str(&format!("--{boundary}\r\n{}\r\n", attachment_part(attachment)));
        }
        out.push_str(&format!("--{boundary}--\r\n"));
        out
    }

    /// Content headers plus body of the non-attachment part
    fn body_part(&self) -> String {
        match (&self.text, &self.html) {
            (Some(text), Some(html)) => {
                let boundary = boundary();
                format!(
                    "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n\
                     --{boundary}\r\n{}\r\n\
                     --{boundary}\r\n{}\r\n\
                     --{boundary}--\r\n",
                    text_part("text/plain", text),
                    text_part("text/html", html),
                )
            },
            (None, Some(html)) => text_part("text/html", html),
            (Some(text), None) => text_part("text/plain", text),
            (None, None) => text_part("text/plain", ""),
        }
    }
}

fn text_part(mime: &str, body: &str) -> String {
    format!(
        "Content-Type: {mime}; charset=utf-8\r\n\
         Content-Transfer-Encoding: 8bit\r\n\r\n{}",
        body.replace("\r\n", "\n").replace('\n', "\r\n")
    )
}

fn attachment_part(attachment: &Attachment) -> String {
    let filename = encode_header(&attachment.filename.replace('"', "'"));
    let content_type = if attachment.content_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        attachment.content_type.trim()
    };
    format!(
        "Content-Type: {content_type}; name=\"{filename}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n{}",
        wrap_base64(&attachment.data)
    )
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE * 2 + 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// RFC 2047 `B` encoding for non-ASCII header text
///
/// Line breaks are folded to spaces first so a value can never start a new header.
pub(crate) fn encode_header(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        return value;
    }
    let value = value.as_str();
    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, ch) in value.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > ENCODED_WORD_BYTES && end > start {
            words.push(&value[start..end]);
            start = end;
        }
        end = next;
    }
    words.push(&value[start..end]);
    words
        .into_iter()
        .map(|w| format!("=?UTF-8?B?{}?=", STANDARD.encode(w)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Collapse each run of CR/LF into one space
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_clean(list: &[String]) -> String {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_address(address: &str) -> Result<(), MailError> {
    let valid = address.contains('@')
        && !address.starts_with('@')
        && !address.ends_with('@')
        && !address.contains(['\r', '\n', '<', '>', ' ']);
    if valid {
        Ok(())
    } else {
        Err(MailError::InvalidAddress(address.to_string()))
    }
}

fn boundary() -> String {
    format!("=_mailsync_{}", Uuid::new_v4().simple())
}
