//! Portal error taxonomy.
//!
//! Every failure surfaced to a user action falls into one of these classes.
//! Keep this focused on deterministic, user-meaningful failures; each class is
//! handled at the boundary nearest the action that triggered it, never by a
//! global handler.

use thiserror::Error;

/// Result type used across the portal domain layer.
pub type PortalResult<T> = Result<T, PortalError>;

/// Portal-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// Bad credentials or unknown account. Recovered by re-prompting, never
    /// retried automatically.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The account exists but is deactivated or role-mismatched for the
    /// requested portal. The session is torn down, not retried.
    #[error("account ineligible: {0}")]
    AccountIneligible(String),

    /// The actor lacks rights for the requested management action. The
    /// attempted write is never issued.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Malformed input to a state transition, caught before any write.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Optimistic-concurrency failure: another writer got there first.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A requested record was not found.
    #[error("not found")]
    NotFound,

    /// The backing store is unreachable or timed out. Surfaced with a retry
    /// affordance; never retried automatically.
    #[error("store unavailable: {0}")]
    TransientStore(String),
}

impl PortalError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    pub fn ineligible(msg: impl Into<String>) -> Self {
        Self::AccountIneligible(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::AuthorizationDenied(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::TransientStore(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
