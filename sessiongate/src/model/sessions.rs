//! Sessions storage
//!
//! A session token is 32 bytes taken from the OS random source, encoded with URL-safe Base64 without
//! padding. Tokens are opaque: they carry no data, everything about the session is kept in the
//! `sessions` table under the token as the primary key. That makes the database the single source
//! of truth - a session is valid as long as its row exists and it didn't pass its expiration time.
//!
//! Expired sessions are never touched by validation. They stay in the table until the owner is
//! removed (the rows are cascaded), or until they are purged with `Session::cleanup`.

use base64::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::users::Email;

/// Number of random bytes in the session token
pub const TOKEN_BYTES: usize = 32;

/// How many times issuing a session is retried on token collision
const ISSUE_ATTEMPTS: usize = 3;

/// Newtype for session token string
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

// Tokens are credentials, keep them out of the logs
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl SessionToken {
    /// Generates a fresh random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates the token returning the session owner
    pub async fn validate(
        &self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Email, Error> {
        Session::validate_at(db, self, Utc::now()).await
    }
}

/// Session data
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session token
    pub token: SessionToken,
    /// User owning this session
    pub owner: Email,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(token: SessionToken, owner: Email, validity: TimeDelta) -> Self {
        let created_at = Utc::now();
        Self {
            token,
            owner,
            created_at,
            expires_at: created_at + validity,
        }
    }

    /// Stores the session in DB
    ///
    /// Fails with `Error::Conflict` if the token is already taken, leaving the stored session intact.
    pub async fn insert(
        &self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<(), Error> {
        let insertion = sqlx::query(
            "insert into sessions (id, owner_email, created_at, expires_at) values (?, ?, ?, ?) on conflict(id) do nothing",
        )
        .bind(self.token.as_str())
        .bind(&self.owner)
        .bind(self.created_at)
        .bind(self.expires_at)
        .execute(db)
        .await?;

        if insertion.rows_affected() == 0 {
            return Err(Error::Conflict);
        }

        Ok(())
    }

    /// Issues a session for the user, retrying with a new token on collision
    pub async fn issue(
        db: &sqlx::SqlitePool,
        owner: Email,
        validity: TimeDelta,
    ) -> Result<Self, Error> {
        Self::issue_with(db, owner, validity, SessionToken::generate).await
    }

    async fn issue_with(
        db: &sqlx::SqlitePool,
        owner: Email,
        validity: TimeDelta,
        mut token: impl FnMut() -> SessionToken,
    ) -> Result<Self, Error> {
        for attempt in 1..=ISSUE_ATTEMPTS {
            let session = Self::new(token(), owner.clone(), validity);
            match session.insert(db).await {
                Ok(()) => return Ok(session),
                Err(Error::Conflict) => warn!(attempt, "Session token collision"),
                Err(err) => return Err(err),
            }
        }

        Err(Error::Conflict)
    }

    /// Validates a session token against the given point in time, returning the session owner
    ///
    /// The session is valid only if `now` is strictly before its expiration.
    pub async fn validate_at(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Email, Error> {
        let (owner, expires_at): (Email, DateTime<Utc>) =
            sqlx::query_as("select owner_email, expires_at from sessions where id = ?")
                .bind(token.as_str())
                .fetch_optional(db)
                .await?
                .ok_or(Error::SessionInvalid)?;

        if now >= expires_at {
            debug!(%owner, %expires_at, "Session expired");
            return Err(Error::SessionExpired);
        }

        Ok(owner)
    }

    /// Cleans expired sessions from database, returning the number of removed sessions
    pub async fn cleanup(db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>) -> Result<u64, Error> {
        let now = Utc::now();
        let deletion = sqlx::query("delete from sessions where expires_at <= ?")
            .bind(now)
            .execute(db)
            .await?;
        Ok(deletion.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    use crate::config;
    use crate::model::password::Passwords;
    use crate::model::users::Registration;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("model/migrations").run(&pool).await.unwrap();
        pool
    }

    async fn create_user(pool: &SqlitePool, email: &str) -> Email {
        let passwords = Passwords::new(&config::PasswordHashing {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();

        Registration::new(email, "password123", "password123")
            .register(pool, &passwords)
            .await
            .unwrap()
    }

    fn validity() -> TimeDelta {
        TimeDelta::hours(48)
    }

    mod token {
        use super::*;

        #[test]
        fn token_carries_256_bits() {
            let token = SessionToken::generate();
            let bytes = BASE64_URL_SAFE_NO_PAD.decode(token.as_str()).unwrap();
            assert_eq!(bytes.len(), TOKEN_BYTES);
            assert!(
                token
                    .as_str()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }

        #[test]
        fn tokens_never_repeat() {
            let tokens: HashSet<_> = (0..10_000).map(|_| SessionToken::generate()).collect();
            assert_eq!(tokens.len(), 10_000);
        }

        #[test]
        fn debug_hides_token() {
            let token = SessionToken::generate();
            assert!(!format!("{token:?}").contains(token.as_str()));
        }
    }

    mod session {
        use super::*;

        #[tokio::test]
        async fn validate_issued_session() {
            let pool = setup_pool().await;

            let user1 = create_user(&pool, "user1@example.com").await;
            let session1 = Session::issue(&pool, user1.clone(), validity())
                .await
                .unwrap();
            assert_eq!(session1.expires_at - session1.created_at, validity());
            assert_eq!(session1.token.validate(&pool).await.unwrap(), user1);

            let user2 = create_user(&pool, "user2@example.com").await;
            let session2 = Session::issue(&pool, user2.clone(), validity())
                .await
                .unwrap();

            // Also multiple sessions for single user
            let session3 = Session::issue(&pool, user2.clone(), validity())
                .await
                .unwrap();
            assert_ne!(session2.token, session3.token);

            assert_eq!(session1.token.validate(&pool).await.unwrap(), user1);
            assert_eq!(session2.token.validate(&pool).await.unwrap(), user2);
            assert_eq!(session3.token.validate(&pool).await.unwrap(), user2);
        }

        #[tokio::test]
        async fn validate_with_random_data_fails() {
            let pool = setup_pool().await;

            let err = SessionToken::from("fake_token".to_owned())
                .validate(&pool)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SessionInvalid));

            let err = SessionToken::generate().validate(&pool).await.unwrap_err();
            assert!(matches!(err, Error::SessionInvalid));
        }

        #[tokio::test]
        async fn validate_after_expiration_fails() {
            let pool = setup_pool().await;

            let user = create_user(&pool, "user1@example.com").await;
            let session = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();

            let just_before = session.expires_at - TimeDelta::seconds(1);
            let owner = Session::validate_at(&pool, &session.token, just_before)
                .await
                .unwrap();
            assert_eq!(owner, user);

            let err = Session::validate_at(&pool, &session.token, session.expires_at)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SessionExpired));

            let err = Session::validate_at(&pool, &session.token, session.expires_at + validity())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SessionExpired));
        }

        async fn sessions_count(pool: &SqlitePool) -> i64 {
            let (count,): (i64,) = sqlx::query_as("select count(*) from sessions")
                .fetch_one(pool)
                .await
                .unwrap();
            count
        }

        #[tokio::test]
        async fn duplicated_token_conflicts() {
            let pool = setup_pool().await;

            let alice = create_user(&pool, "alice@example.com").await;
            let bob = create_user(&pool, "bob@example.com").await;
            let session = Session::issue(&pool, alice.clone(), validity())
                .await
                .unwrap();

            let duplicate = Session::new(session.token.clone(), bob, validity());
            let err = duplicate.insert(&pool).await.unwrap_err();
            assert!(matches!(err, Error::Conflict));

            assert_eq!(sessions_count(&pool).await, 1);
            assert_eq!(session.token.validate(&pool).await.unwrap(), alice);
        }

        #[tokio::test]
        async fn issue_retries_on_collision() {
            let pool = setup_pool().await;

            let user = create_user(&pool, "user1@example.com").await;
            let taken = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();

            let mut tokens = vec![SessionToken::generate(), taken.token.clone()];
            let session = Session::issue_with(&pool, user.clone(), validity(), || {
                tokens.pop().unwrap()
            })
            .await
            .unwrap();

            assert_ne!(session.token, taken.token);
            assert!(tokens.is_empty());
            assert_eq!(sessions_count(&pool).await, 2);
            assert_eq!(session.token.validate(&pool).await.unwrap(), user);
        }

        #[tokio::test]
        async fn issue_gives_up_after_attempts() {
            let pool = setup_pool().await;

            let user = create_user(&pool, "user1@example.com").await;
            let taken = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();

            let mut attempts = 0;
            let err = Session::issue_with(&pool, user, validity(), || {
                attempts += 1;
                taken.token.clone()
            })
            .await
            .unwrap_err();

            assert!(matches!(err, Error::Conflict));
            assert_eq!(attempts, ISSUE_ATTEMPTS);
            assert_eq!(sessions_count(&pool).await, 1);
        }

        #[tokio::test]
        async fn issue_for_unknown_user_fails() {
            let pool = setup_pool().await;

            let err = Session::issue(&pool, Email::from("ghost@example.com"), validity())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Store(_)));
        }

        #[tokio::test]
        async fn deleting_user_cascades() {
            let pool = setup_pool().await;

            let user = create_user(&pool, "user1@example.com").await;
            let session1 = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();
            let session2 = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();

            sqlx::query("delete from users where email = ?")
                .bind(&user)
                .execute(&pool)
                .await
                .unwrap();

            let (count,): (i64,) = sqlx::query_as("select count(*) from sessions")
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0);

            for session in [session1, session2] {
                let err = session.token.validate(&pool).await.unwrap_err();
                assert!(matches!(err, Error::SessionInvalid));
            }
        }

        #[tokio::test]
        async fn cleanup_removes_only_expired() {
            let pool = setup_pool().await;

            let user = create_user(&pool, "user1@example.com").await;
            let expired = Session::issue(&pool, user.clone(), TimeDelta::seconds(-1))
                .await
                .unwrap();
            let valid = Session::issue(&pool, user.clone(), validity())
                .await
                .unwrap();

            let removed = Session::cleanup(&pool).await.unwrap();
            assert_eq!(removed, 1);

            let err = expired.token.validate(&pool).await.unwrap_err();
            assert!(matches!(err, Error::SessionInvalid));
            assert_eq!(valid.token.validate(&pool).await.unwrap(), user);
        }
    }
}
