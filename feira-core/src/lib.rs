pub mod identity;
pub mod payment;

/// Failure categories shared by every operation in the system.
///
/// The variant decides how callers react (and which HTTP status the API
/// maps it to); the message is what the client sees.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The request itself is malformed or breaks a business rule (400).
    #[error("{0}")]
    Validation(String),
    /// The caller is authenticated but not allowed to touch this resource (403).
    #[error("{0}")]
    Permission(String),
    /// The resource does not exist, or a guarded update found nothing to claim (404).
    #[error("{0}")]
    NotFound(String),
    /// A concurrent actor got there first, or state no longer allows this (409).
    #[error("{0}")]
    Conflict(String),
    /// An external collaborator (payment provider) failed or is misconfigured (502).
    #[error("{0}")]
    Upstream(String),
    /// Storage or invariant failure; logged in full, surfaced generically (500).
    #[error("{0}")]
    Integrity(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
