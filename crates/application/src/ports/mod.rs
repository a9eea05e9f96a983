//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod account_store;
mod credential_cipher;
mod mail_analysis;
mod mail_client;
mod message_store;
mod raw_message;

#[cfg(test)]
pub use account_store::MockAccountStorePort;
pub use account_store::AccountStorePort;
#[cfg(test)]
pub use credential_cipher::MockCredentialCipherPort;
pub use credential_cipher::CredentialCipherPort;
#[cfg(test)]
pub use mail_analysis::MockMailAnalysisPort;
pub use mail_analysis::{MailAnalysisPort, NoOpMailAnalysis};
#[cfg(test)]
pub use mail_client::{MockIncomingMailClient, MockMailConnectorPort, MockOutgoingMailClient};
pub use mail_client::{
    ConnectionTest, FetchOptions, IncomingMailClient, MailConnectorPort, OutgoingAttachment,
    OutgoingEmail, OutgoingMailClient, SendOutcome,
};
#[cfg(test)]
pub use message_store::MockMessageStorePort;
pub use message_store::{DEFAULT_PAGE_SIZE, EmailQuery, MessageStorePort};
pub use raw_message::{
    ImapFlags, MailAddress, MessageContent, RawImapMessage, RawMessage, RawPop3Message,
};
