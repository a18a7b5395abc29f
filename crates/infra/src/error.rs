//! Infrastructure error types.
//!
//! Storage and collaborator failures are kept apart from domain errors: the
//! refresh orchestrator retries the former and never the latter.

use thiserror::Error;

use figura_graph::GraphError;
use figura_suggestions::TransitionError;

/// A persistence backend failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Backend(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// A collaborator (catalog, progression, subject directory) failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn unavailable(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name,
            message: message.into(),
        }
    }
}

/// Failure of a checked edge write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EdgeWriteError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a cache decision write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
