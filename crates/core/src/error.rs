//! Errors raised while constructing domain values.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A value could not be built from its raw parts.
///
/// Lookups, conflicts and lifecycle rules have their own error types in the
/// crates that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
