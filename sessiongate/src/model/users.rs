//! Users credentials storage

use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use tracing::debug;

use crate::error::Error;
use crate::model::password::Passwords;

/// Minimal accepted password length, in characters
pub const MIN_PASSWORD_LEN: usize = 9;

/// Newtype for user email, the primary user identifier
///
/// Emails are compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Email(String);

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Email {
    fn from(email: &str) -> Self {
        Self(email.to_owned())
    }
}

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Registration form
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub email: Email,
    pub password: String,
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: String,
}

// Passwords never reach the logs
impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Registration {
    pub fn new(
        email: impl Into<Email>,
        password: impl Into<String>,
        password_confirm: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            password_confirm: password_confirm.into(),
        }
    }

    /// Checks the form before anything is hashed or stored
    fn validate(&self) -> Result<(), Error> {
        if self.email.0.trim().is_empty() {
            return Err(Error::Validation("Email is required".into()));
        }

        if self.password != self.password_confirm {
            return Err(Error::Validation("Passwords don't match".into()));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        Ok(())
    }

    /// Creates the user in the database, returning its email
    ///
    /// Duplicated email is detected by the `users` primary key, so concurrent registrations of the
    /// same email result in exactly one user.
    pub async fn register(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        passwords: &Passwords,
    ) -> Result<Email, Error> {
        self.validate()?;

        let Self {
            email, password, ..
        } = self;
        let password_hash = passwords.hash(password).await?;

        sqlx::query("insert into users(email, password_hash) values (?, ?)")
            .bind(&email)
            .bind(password_hash)
            .execute(db)
            .await?;

        debug!(%email, "User created");
        Ok(email)
    }
}

/// Login form
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: Email,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(email: impl Into<Email>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Verifies the password against the stored hash returning the verified email
    ///
    /// Unknown email and wrong password both fail with `Error::Auth`.
    pub async fn verify(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        passwords: &Passwords,
    ) -> Result<Email, Error> {
        let stored: Option<(String,)> =
            sqlx::query_as("select password_hash from users where email = ?")
                .bind(&self.email)
                .fetch_optional(db)
                .await?;

        let verified = passwords
            .verify(self.password, stored.map(|(hash,)| hash))
            .await?;

        if !verified {
            debug!(email = %self.email, "Credentials rejected");
            return Err(Error::Auth);
        }

        Ok(self.email)
    }
}
