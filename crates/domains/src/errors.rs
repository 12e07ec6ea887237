//! # Errors
//!
//! Two layers: [`BackendError`] is what a port returns when the remote
//! service refuses or fails a call; [`DomainError`] is what a use-case
//! returns, already classified for the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by an external service (database, auth, storage, model).
///
/// Carries the service's own message and, when it provides one, its error code.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub code:    Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self { message: message.into(), code: Some(code.into()) }
    }

    /// The auth service refused the email/password pair itself, as opposed
    /// to failing the call.
    pub fn is_credential_rejection(&self) -> bool {
        const CREDENTIAL_CODES: [&str; 3] = ["invalid_credentials", "invalid_grant", "email_not_confirmed"];
        self.code.as_deref().is_some_and(|c| CREDENTIAL_CODES.contains(&c))
    }
}

/// The primary error type for all service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (e.g., username too short, attachment limit hit)
    #[error("{0}")]
    Validation(String),

    /// The backend refused a write that passed local validation
    #[error("{message}")]
    Rejected { message: String, code: Option<String> },

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (e.g., post, profile)
    #[error("{0}")]
    NotFound(String),

    /// Resource already exists (e.g., username taken)
    #[error("{0}")]
    Conflict(String),

    /// The backend failed a call we could not classify further
    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Internal(String),
}

impl DomainError {
    /// Treats a backend failure as a refused write, keeping its code.
    pub fn rejected(err: BackendError) -> Self {
        DomainError::Rejected { message: err.message, code: err.code }
    }

    /// Machine-readable code, when the backend supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            DomainError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<BackendError> for DomainError {
    fn from(err: BackendError) -> Self {
        DomainError::Backend(err.message)
    }
}

/// A specialized Result type for Kashaaf use-cases.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
