//! Auth Error Types

use oa_common::DeadlineExceeded;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Storage-level uniqueness violation.
    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Authorization error: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// True for a uniqueness violation on `field`.
    pub fn is_duplicate_of(&self, field: &str) -> bool {
        matches!(self, AuthError::Duplicate { field: f, .. } if f == field)
    }
}

impl From<DeadlineExceeded> for AuthError {
    fn from(_: DeadlineExceeded) -> Self {
        AuthError::DeadlineExceeded
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// MongoDB duplicate key error code.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// True when a write failed on a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
