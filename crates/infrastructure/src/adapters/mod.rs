//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod credential_cipher;
mod mail_connector;
mod webhook_analysis;

pub use credential_cipher::AesGcmCredentialCipher;
pub use mail_connector::NetworkMailConnector;
pub use webhook_analysis::WebhookMailAnalysisAdapter;
