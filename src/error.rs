//! Error handling for the planner

use partyplan_auth::AuthError;
use partyplan_postgrest::{codes, PostgrestError};
use std::fmt;
use thiserror::Error;

/// Unified error type for planner operations.
///
/// Backend failures are classified by their error code, never by message
/// text.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before anything was sent
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No session, or the session was rejected
    #[error("Not signed in")]
    NotAuthenticated,

    /// Wrong email or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Signed in, but not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint hit, or an exclusive resource is held by someone else
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Other auth API errors
    #[error("Authentication error: {0}")]
    Auth(AuthError),

    /// Other PostgREST errors
    #[error("Database error: {0}")]
    Database(PostgrestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    pub fn forbidden<T: fmt::Display>(msg: T) -> Self {
        Error::Forbidden(msg.to_string())
    }

    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    pub fn conflict<T: fmt::Display>(msg: T) -> Self {
        Error::Conflict(msg.to_string())
    }

    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Whether the caller should be sent to the login page
    pub fn needs_login(&self) -> bool {
        matches!(self, Error::NotAuthenticated)
    }
}

impl From<PostgrestError> for Error {
    fn from(err: PostgrestError) -> Self {
        let message = err.api_message().unwrap_or_default().to_string();
        if err.is_unique_violation() {
            return Error::Conflict(message);
        }
        if err.is_not_found() {
            return Error::NotFound(message);
        }
        if err.is_unauthorized() {
            return Error::NotAuthenticated;
        }
        if err.is_permission_denied() {
            return Error::Forbidden(message);
        }
        match err {
            PostgrestError::NetworkError(e) => Error::Network(e),
            PostgrestError::ApiError { ref details, .. }
                if details.code.as_deref() == Some(codes::RAISE_EXCEPTION) =>
            {
                // rpc functions raise their refusals as plain exceptions
                Error::Forbidden(message)
            }
            other => Error::Database(other),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        if err.is_invalid_credentials() {
            return Error::InvalidCredentials;
        }
        if err.is_unauthorized() {
            return Error::NotAuthenticated;
        }
        match err {
            AuthError::NetworkError(e) => Error::Network(e),
            other => Error::Auth(other),
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
