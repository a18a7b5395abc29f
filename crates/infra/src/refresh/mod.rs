//! Batch Refresh Orchestrator.
//!
//! - Walks every tenant's learners and active groups
//! - Scores candidates against one graph snapshot per tenant
//! - Each subject is an independent unit: timeout, bounded retries with backoff
//! - Failures are logged, counted, and never abort the run

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::{SourceError, StoreError};

mod orchestrator;
mod scheduler;
mod summary;


pub use orchestrator::SuggestionRefresher;
pub use scheduler::{RefreshScheduler, RefreshSchedulerHandle};
pub use summary::{
    CandidateFailure, RefreshSummary, RefreshTotals, SubjectOutcome, SubjectReport, SubjectResult,
    SummaryBoard, TenantFailure,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Lifetime of a pending entry after each refresh.
    pub ttl: chrono::Duration,
    /// Budget for one attempt at one subject.
    pub subject_timeout: Duration,
    /// Subjects refreshed in parallel.
    pub concurrency: usize,
    /// Attempts per subject, including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_suggestions_per_subject: usize,
}

/// Upper bound on the pending-entry lifetime (one year).
pub const MAX_SUGGESTION_TTL_HOURS: u32 = 24 * 366;

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(48),
            subject_timeout: Duration::from_secs(30),
            concurrency: 4,
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
            max_suggestions_per_subject: 20,
        }
    }
}

impl RefreshConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, message: &str| ConfigError::Invalid {
            key,
            message: message.to_string(),
        };
        if self.ttl <= chrono::Duration::zero() {
            return Err(invalid("SUGGESTION_TTL_HOURS", "must be positive"));
        }
        if self.ttl.num_hours() > i64::from(MAX_SUGGESTION_TTL_HOURS) {
            return Err(invalid("SUGGESTION_TTL_HOURS", "exceeds one year"));
        }
        if self.subject_timeout.is_zero() {
            return Err(invalid("REFRESH_SUBJECT_TIMEOUT_SECS", "must be positive"));
        }
        if self.concurrency == 0 {
            return Err(invalid("REFRESH_CONCURRENCY", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("REFRESH_MAX_ATTEMPTS", "must be at least 1"));
        }
        if self.max_suggestions_per_subject == 0 {
            return Err(invalid("MAX_SUGGESTIONS_PER_SUBJECT", "must be at least 1"));
        }
        Ok(())
    }
}

/// Why one subject (or a whole tenant) could not be refreshed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("refresh worker failed: {0}")]
    Worker(String),
}

/// Exponential backoff, capped at 10s.
pub(crate) fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = 1u32 << attempt.saturating_sub(1).min(10);
    let d = base.saturating_mul(exp);
    d.min(Duration::from_secs(10))
}
