use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a cached suggestion.
///
/// ```text
/// pending ──accept──▶ accepted ──reset──▶ pending
/// pending ──dismiss─▶ dismissed ─reset──▶ pending
/// pending ──refresh─▶ pending
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "accepted" => Some(SuggestionStatus::Accepted),
            "dismissed" => Some(SuggestionStatus::Dismissed),
            _ => None,
        }
    }

    /// A user decision is recorded; refresh passes leave the entry alone.
    pub fn is_decided(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }

    pub fn can_transition_to(self, to: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self, to),
            (Pending, Accepted)
                | (Pending, Dismissed)
                | (Accepted, Pending)
                | (Dismissed, Pending)
                | (Pending, Pending)
        )
    }

    pub fn transition(self, to: SuggestionStatus) -> Result<SuggestionStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError::InvalidTransition { from: self, to })
        }
    }
}

impl core::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid suggestion transition: {from} -> {to}")]
    InvalidTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },
}
