//! Error types for Student Wall operations

use thiserror::Error;

/// Client-side form validation errors, raised before any remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Field {field} is too short: {actual} characters, minimum {min}")]
    TooShort {
        field: String,
        min: usize,
        actual: usize,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Tagged failure payload returned by the remote wall service.
///
/// The payload is carried verbatim so the view can show it unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Remote service error: {payload}")]
pub struct RemoteFailure {
    pub payload: String,
}

impl RemoteFailure {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Query cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cached value under {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Identity provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Login flow was cancelled")]
    Cancelled,

    #[error("Identity provider failed: {reason}")]
    Provider { reason: String },
}

/// Master error type for all Student Wall errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WallError {
    #[error("Not authenticated: no service handle available")]
    Unauthenticated,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Remote(#[from] RemoteFailure),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl WallError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Errors the client resolves on its own (disabling an action, showing a
    /// form hint) rather than surfacing as an operation's terminal state.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Validation(_))
    }
}

/// Result type alias for Student Wall operations.
pub type WallResult<T> = Result<T, WallError>;

/// Result of a single remote service call.
pub type RemoteResult<T> = Result<T, RemoteFailure>;

// =============================================================================
// TESTS
// =============================================================================
