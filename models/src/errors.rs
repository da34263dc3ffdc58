// models/src/errors.rs

use std::io;

pub use thiserror::Error;
use bcrypt::BcryptError;
use uuid::Error as UuidError;

#[derive(Debug, Error)]
pub enum MedError {
    #[error("Storage error: {0}")]
    StorageError(String), // General storage operation error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Entity already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid data provided: {0}")]
    InvalidData(String),
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Plan limit reached: {0}")]
    LimitExceeded(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("UUID parsing error: {0}")]
    Uuid(#[from] UuidError),
    #[cfg(feature = "sled-errors")]
    #[error(transparent)]
    Sled(#[from] sled::Error),
}

impl MedError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MedError::NotFound { entity, id: id.to_string() }
    }
}

impl From<serde_json::Error> for MedError {
    fn from(err: serde_json::Error) -> Self {
        MedError::SerializationError(format!("JSON processing error: {}", err))
    }
}

impl From<BcryptError> for MedError {
    fn from(err: BcryptError) -> Self {
        MedError::InternalError(format!("Password hashing error: {}", err))
    }
}

/// A validation error.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// An invalid value was provided where a specific value or format was expected.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// An identifier is invalid (e.g., malformed string).
    #[error("identifier '{0}' is invalid")]
    InvalidIdentifier(String),
    /// An identifier has an invalid length.
    #[error("identifier has invalid length")]
    InvalidIdentifierLength,
    /// The identifier is reserved by the platform.
    #[error("identifier '{0}' is reserved")]
    ReservedIdentifier(String),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("password must be at least {0} characters long")]
    PasswordTooShort(usize),
    #[error("start must be before end")]
    InvalidTimeRange,
    #[error("cannot move from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// A type alias for a `Result` that returns a `MedError` on failure.
pub type MedResult<T> = Result<T, MedError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Rejects empty or whitespace-only values.
pub fn require_non_empty(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// A deliberately loose check: one `@`, something on both sides, a dot in the domain.
pub fn validate_email(value: &str) -> ValidationResult<()> {
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::InvalidEmail(value.to_string()));
    };
    if local.is_empty() || domain.len() < 3 || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::InvalidEmail(value.to_string()));
    }
    Ok(())
}
