//! RFC 5322 / MIME parsing of fetched messages

use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail, addrparse_header};
use tracing::debug;

use crate::MailError;

/// A mailbox from an address header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub address: String,
    pub name: Option<String>,
}

/// Headers and bodies extracted from a raw message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Parse a complete message as returned by `BODY[]` or `RETR`
///
/// Malformed individual headers are skipped; only an unparseable message
/// structure is an error.
pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage, MailError> {
    let mail = mailparse::parse_mail(raw).map_err(|e| MailError::Parse(e.to_string()))?;
    let headers = &mail.headers;

    let mut parsed = ParsedMessage {
        message_id: headers
            .get_first_value("Message-ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        subject: headers.get_first_value("Subject"),
        from: addresses(&mail, "From"),
        to: addresses(&mail, "To"),
        cc: addresses(&mail, "Cc"),
        bcc: addresses(&mail, "Bcc"),
        date: headers
            .get_first_value("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        ..ParsedMessage::default()
    };
    collect_bodies(&mail, &mut parsed);
    Ok(parsed)
}

fn addresses(mail: &ParsedMail<'_>, header: &str) -> Vec<Address> {
    let Some(header) = mail.headers.get_first_header(header) else {
        return Vec::new();
    };
    match addrparse_header(header) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(single) => vec![single.clone()],
                MailAddr::Group(group) => group.addrs.clone(),
            })
            .map(|single| Address {
                address: single.addr,
                name: single.display_name.filter(|n| !n.trim().is_empty()),
            })
            .collect(),
        Err(e) => {
            debug!(error = %e, "Skipping unparseable address header");
            Vec::new()
        },
    }
}

/// Take the first `text/plain` and `text/html` parts that are not attachments
fn collect_bodies(part: &ParsedMail<'_>, parsed: &mut ParsedMessage) {
    if part.get_content_disposition().disposition == DispositionType::Attachment {
        return;
    }
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_bodies(sub, parsed);
        }
        return;
    }
    let slot = match part.ctype.mimetype.to_ascii_lowercase().as_str() {
        "text/plain" => &mut parsed.text,
        "text/html" => &mut parsed.html,
        _ => return,
    };
    if slot.is_none() {
        match part.get_body() {
            Ok(body) => *slot = Some(body),
            Err(e) => debug!(error = %e, "Skipping undecodable body part"),
        }
    }
}
