//! Persistence module
//!
//! SQLite storage for mailbox accounts and their messages, on a shared sqlx pool.

mod account_store;
mod async_connection;
mod columns;
mod error;
mod message_store;

pub use account_store::AsyncAccountStore;
pub use async_connection::{AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError};
pub use error::map_sqlx_error;
pub use message_store::AsyncMessageStore;
