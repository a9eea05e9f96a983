//! Application services - Use case implementations

mod email_service;
mod folder_selector;
mod mail_requests;
mod message_normalizer;

pub use email_service::{EmailService, SyncLimits};
pub use folder_selector::{FolderPatterns, FolderSelector};
pub use mail_requests::{
    ACCOUNT_NOT_FOUND, AddAccountResult, AllFoldersOptions, FolderSyncResult, NewAccountRequest,
    SendEmailRequest, SendResult, SyncOptions, SyncResult,
};
pub use message_normalizer::normalize_message;
