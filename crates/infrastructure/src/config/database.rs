//! Mail store (SQLite) settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

const MEMORY_PATH: &str = ":memory:";

/// Where synced mail and account records are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:` for a throwaway store
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Pool size; forced to 1 for `:memory:`
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Apply the embedded migrations when the store is opened
    #[serde(default = "default_true")]
    pub run_migrations: bool,

    /// Write-ahead logging for file databases
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// How long a sync waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> String {
    "mailsync.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            run_migrations: true,
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.trim() == MEMORY_PATH
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
