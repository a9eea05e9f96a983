//! Domain entities - Objects with identity and lifecycle

mod email_account;
mod email_message;
mod mailbox_stats;

pub use email_account::{EmailAccount, SyncStatus};
pub use email_message::{EmailMessage, INBOX_FOLDER, SENT_FOLDER};
pub use mailbox_stats::MailboxStats;
