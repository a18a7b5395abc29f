//! Suggestion domain (pure).
//!
//! - readiness scoring of a candidate skill against a subject's completion state
//! - the cached suggestion entry and its pending/accepted/dismissed lifecycle
//!
//! No IO here: inputs (edges, completion states, `now`) are passed in by
//! `figura-infra`.

pub mod calculator;
pub mod completion;
pub mod entry;
pub mod score;
pub mod status;

pub use calculator::PreparationScoreCalculator;
pub use completion::CompletionState;
pub use entry::{Decision, DecisionOutcome, RefreshOutcome, SuggestionEntry};
pub use score::{breakdown, compute_readiness, NotApplicable, PrerequisiteProgress, Readiness, Score};
pub use status::{SuggestionStatus, TransitionError};
