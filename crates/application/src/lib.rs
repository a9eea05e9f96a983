//! Application layer - Use cases and orchestration
//!
//! Defines the ports the mail subsystem talks through and the services that
//! drive account onboarding, synchronization, querying and sending.

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
