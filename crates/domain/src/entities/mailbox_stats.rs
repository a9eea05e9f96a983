//! Per-account message counters

use serde::{Deserialize, Serialize};

use super::EmailMessage;

/// Counts shown next to an account
///
/// `total` and `unread` leave out trashed messages; `starred` does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxStats {
    pub total: u64,
    pub unread: u64,
    pub starred: u64,
    pub trash: u64,
}

impl MailboxStats {
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a EmailMessage>) -> Self {
        messages.into_iter().fold(Self::default(), |mut stats, msg| {
            if msg.is_trash {
                stats.trash += 1;
            } else {
                stats.total += 1;
                if !msg.is_read {
                    stats.unread += 1;
                }
            }
            if msg.is_starred {
                stats.starred += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::AccountId;

    #[test]
    fn trashed_messages_are_counted_separately() {
        let account = AccountId::new();
        let mut messages: Vec<_> = (0..5)
            .map(|i| EmailMessage::new(account, format!("m{i}"), "INBOX"))
            .collect();
        messages[0].is_trash = true;
        messages[1].is_trash = true;
        messages[1].is_starred = true;
        messages[2].is_read = true;

        let stats = MailboxStats::from_messages(&messages);
        assert_eq!(
            stats,
            MailboxStats {
                total: 3,
                unread: 2,
                starred: 1,
                trash: 2,
            }
        );
    }
}
