//! Service global model

use std::path::PathBuf;

use chrono::TimeDelta;
use color_eyre::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

pub mod password;
pub mod sessions;
pub mod users;

use crate::config;
use crate::error::Error;
use password::Passwords;
use sessions::{Session, SessionToken};
use users::{Credentials, Email, Registration};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid SQLite path: {path}")]
    InvalidSQLitePath { path: PathBuf },
    #[error("Invalid session validity: {hours} hours")]
    InvalidSessionValidity { hours: i64 },
}

/// Credentials and sessions shared by all the request handlers
#[derive(Clone)]
pub struct Model {
    /// Database access
    db: sqlx::SqlitePool,
    /// Passwords hasher
    passwords: Passwords,
    /// How long issued sessions are valid
    session_validity: TimeDelta,
}

impl Model {
    /// Model for testing purposes - using the in-memory SQLite database and cheap password hashing
    pub async fn test() -> Result<Self> {
        let db = Self::memory_pool(1).await?;
        let passwords = Passwords::new(&config::PasswordHashing {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })?;

        Ok(Self {
            db,
            passwords,
            session_validity: TimeDelta::hours(config::Sessions::default().validity_hours),
        })
    }

    /// Model from configuration
    ///
    /// If the database is created in-memory, the migrations are being executed automatically. If database is
    /// file based migrations would be executed only if requested by configuration.
    pub async fn with_config(db: config::Database, auth: config::Auth) -> Result<Self> {
        use config::Database::*;

        let db = match db {
            Memory { max_connections } => Self::memory_pool(max_connections).await?,

            SqLite {
                path,
                max_connections,
                migrate,
            } => {
                let path = path
                    .as_path()
                    .to_str()
                    .ok_or_else(|| SetupError::InvalidSQLitePath { path: path.clone() })?;

                let opts = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .foreign_keys(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(opts);

                if migrate {
                    sqlx::migrate!("model/migrations").run(&pool).await?;
                    info!(path, "Database migrated");
                }

                pool
            }
        };

        let hours = auth.session.validity_hours;
        let session_validity = TimeDelta::try_hours(hours)
            .filter(|validity| *validity > TimeDelta::zero())
            .ok_or(SetupError::InvalidSessionValidity { hours })?;

        Ok(Self {
            db,
            passwords: Passwords::new(&auth.password)?,
            session_validity,
        })
    }

    /// Shared in-memory database, living as long as the pool keeps a connection open
    async fn memory_pool(max_connections: u32) -> Result<sqlx::SqlitePool> {
        let opts: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let opts = opts.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("model/migrations").run(&pool).await?;
        Ok(pool)
    }

    /// Accesses the DB pool
    pub fn db(&self) -> &sqlx::SqlitePool {
        &self.db
    }

    /// Validity window of newly issued sessions
    pub fn session_validity(&self) -> TimeDelta {
        self.session_validity
    }

    /// Registers a new user
    pub async fn register(&self, registration: Registration) -> Result<Email, Error> {
        registration.register(&self.db, &self.passwords).await
    }

    /// Verifies user credentials returning the verified email
    pub async fn verify(&self, credentials: Credentials) -> Result<Email, Error> {
        credentials.verify(&self.db, &self.passwords).await
    }

    /// Issues a new session for the user
    pub async fn issue(&self, owner: Email) -> Result<Session, Error> {
        Session::issue(&self.db, owner, self.session_validity).await
    }

    /// Validates the session token returning the session owner
    pub async fn validate(&self, token: &SessionToken) -> Result<Email, Error> {
        token.validate(&self.db).await
    }

    /// Performs cleanup on the model, returning the number of purged sessions
    pub async fn cleanup(&self) -> Result<u64, Error> {
        Session::cleanup(&self.db).await
    }
}
