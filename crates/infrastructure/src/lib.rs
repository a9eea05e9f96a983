//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports: AES-GCM credential encryption, SQLite
//! stores, network mail clients and the analysis webhook. Also owns
//! configuration loading and telemetry setup.

pub mod adapters;
pub mod config;
pub mod persistence;
mod service_factory;
pub mod telemetry;

pub use adapters::*;
pub use config::{AppConfig, DatabaseConfig, Environment, MailConfig, SecurityConfig};
pub use persistence::{AsyncAccountStore, AsyncDatabase, AsyncDatabaseConfig, AsyncMessageStore};
pub use service_factory::{build_email_service, open_database};
pub use telemetry::{LogFormat, TelemetryConfig, TelemetryGuard, init_telemetry};
