//! Storage and authentication configuration

use std::path::PathBuf;

use serde::Deserialize;

/// Database backing users and sessions
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Database {
    /// In-memory SQLite database, lost on restart. Migrations are always executed.
    Memory {
        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,
    },
    /// File based SQLite database
    SqLite {
        /// Database file path, created if missing
        path: PathBuf,

        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,

        /// Run pending migrations on startup
        #[serde(default)]
        migrate: bool,
    },
}

impl Database {
    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::SqLite {
            path: "data.db".into(),
            max_connections: Self::default_max_connections(),
            migrate: true,
        }
    }
}

/// Argon2id cost parameters
///
/// Every stored hash carries the parameters it was created with, so raising the costs affects only
/// hashes created afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordHashing {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Session lifetime settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sessions {
    /// How long an issued session stays valid
    pub validity_hours: i64,
    /// Purge expired sessions when the service starts
    pub cleanup_on_start: bool,
}

impl Default for Sessions {
    fn default() -> Self {
        Self {
            validity_hours: 48,
            cleanup_on_start: true,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Auth {
    #[serde(default)]
    pub password: PasswordHashing,

    #[serde(default)]
    pub session: Sessions,
}
