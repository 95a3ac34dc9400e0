//! Password hashing

use std::sync::Arc;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use color_eyre::Result;
use rand::rngs::OsRng;

use crate::config;
use crate::error::Error;

/// Secret hashed at startup, used to verify against when no user is found
const DUMMY_PASSWORD: &[u8] = b"sessiongate-dummy-password";

/// Argon2id hasher with configured costs
///
/// Hashing and verification are CPU bound, so they are moved to the blocking pool.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    /// Hash of `DUMMY_PASSWORD`, equalizes timing for unknown users
    dummy: Arc<str>,
}

impl Passwords {
    pub fn new(config: &config::PasswordHashing) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy = argon2.hash_password(DUMMY_PASSWORD, &salt)?.to_string();

        Ok(Self {
            argon2,
            dummy: dummy.into(),
        })
    }

    /// Hashes the password into PHC string format
    pub async fn hash(&self, password: String) -> Result<String, Error> {
        let argon2 = self.argon2.clone();
        let hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await??;

        Ok(hash)
    }

    /// Verifies the password against the stored hash
    ///
    /// When there is no stored hash the dummy hash is verified instead and the result is always
    /// `false`.
    pub async fn verify(&self, password: String, stored: Option<String>) -> Result<bool, Error> {
        let argon2 = self.argon2.clone();
        let dummy = self.dummy.clone();

        tokio::task::spawn_blocking(move || -> Result<bool, Error> {
            let known = stored.is_some();
            let stored = stored.as_deref().unwrap_or(&*dummy);
            let hash = PasswordHash::new(stored)?;

            // Parameters are read from the stored hash, not from the configured ones
            match argon2.verify_password(password.as_bytes(), &hash) {
                Ok(()) => Ok(known),
                Err(password_hash::Error::Password) => Ok(false),
                Err(err) => Err(err.into()),
            }
        })
        .await?
    }
}
