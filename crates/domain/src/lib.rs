//! Domain layer for MailSync
//!
//! Mailbox accounts, synchronized messages and the value objects they are built from.
//! Nothing in this crate performs I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::{DomainError, ServerRole};
pub use value_objects::*;
