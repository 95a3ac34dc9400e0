//! Errors reported by credential and session operations

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("Email is already registered")]
    Conflict,
    #[error("Invalid email or password")]
    Auth,
    #[error("Session doesn't exist")]
    SessionInvalid,
    #[error("Session expired")]
    SessionExpired,
    #[error("Store failure: {0}")]
    Store(sqlx::Error),
    #[error("Password hashing failure: {0}")]
    Hashing(#[from] argon2::password_hash::Error),
    #[error("Background task failure: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Any of the failures meaning the caller is not authenticated
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Auth | Self::SessionInvalid | Self::SessionExpired)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation());

        if unique_violation {
            Self::Conflict
        } else {
            Self::Store(err)
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict => StatusCode::BAD_REQUEST,
            Self::Auth | Self::SessionInvalid | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Hashing(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            Self::Validation(_) | Self::Conflict => self.to_string(),
            // Which factor failed is not exposed
            Self::Auth | Self::SessionInvalid | Self::SessionExpired => "Not authenticated".to_owned(),
            Self::Store(_) | Self::Hashing(_) | Self::Task(_) => {
                error!(err = %self, "Request failed");
                "Internal server error".to_owned()
            }
        };

        HttpResponse::build(status)
            .content_type(ContentType::plaintext())
            .body(body)
    }
}
