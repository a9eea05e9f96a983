//! Maps fetched IMAP/POP3 messages onto the stored message shape

use chrono::Utc;
use domain::{AccountId, EmailMessage, INBOX_FOLDER};

use crate::ports::{MailAddress, MessageContent, RawMessage};

/// Normalize a fetched message for storage
///
/// Never fails: absent headers become empty values. Messages without a
/// `Message-ID` get a synthetic one derived from their protocol position so
/// that re-syncing still hits the same row.
pub fn normalize_message(
    raw: &RawMessage,
    account_id: AccountId,
    folder: Option<&str>,
) -> EmailMessage {
    let (message_id, uid, folder, is_read, is_starred, internal_date) = match raw {
        RawMessage::Imap(m) => {
            let folder = folder.unwrap_or(INBOX_FOLDER);
            let fallback = format!("imap-{folder}-{}", m.uid);
            (
                message_id_or(&m.content, fallback),
                m.uid,
                folder,
                m.flags.seen,
                m.flags.flagged,
                m.internal_date,
            )
        },
        RawMessage::Pop3(m) => {
            let fallback = m.unique_id.as_deref().map_or_else(
                || format!("pop3-{}", m.number),
                |uidl| format!("pop3-{uidl}"),
            );
            (
                message_id_or(&m.content, fallback),
                0,
                INBOX_FOLDER,
                false,
                false,
                None,
            )
        },
    };

    let content = raw.content();
    let sender = content.from.first();

    let mut message = EmailMessage::new(account_id, message_id, folder);
    message.uid = uid;
    message.subject = content.subject.clone().unwrap_or_default();
    message.from_address = sender.map(|a| a.address.clone()).unwrap_or_default();
    message.from_name = sender.and_then(|a| a.name.clone()).filter(|n| !n.is_empty());
    message.to_addresses = addresses(&content.to);
    message.cc_addresses = addresses(&content.cc);
    message.bcc_addresses = addresses(&content.bcc);
    message.body_text = content.text.clone();
    message.body_html = content.html.clone();
    message.is_read = is_read;
    message.is_starred = is_starred;
    message.sent_at = content.date;
    message.received_at = internal_date.or(content.date).unwrap_or_else(Utc::now);
    message
}

fn message_id_or(content: &MessageContent, fallback: String) -> String {
    content
        .message_id
        .as_deref()
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
        .filter(|id| !id.is_empty())
        .map_or(fallback, str::to_string)
}

fn addresses(list: &[MailAddress]) -> Vec<String> {
    list.iter()
        .map(|a| a.address.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
