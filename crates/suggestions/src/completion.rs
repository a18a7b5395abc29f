use serde::{Deserialize, Serialize};

/// A subject's progress on one skill, as reported by the progression subsystem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    #[default]
    NotSatisfied,
    InProgress,
    Satisfied,
}

impl CompletionState {
    pub fn is_satisfied(self) -> bool {
        matches!(self, CompletionState::Satisfied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompletionState::NotSatisfied => "not_satisfied",
            CompletionState::InProgress => "in_progress",
            CompletionState::Satisfied => "satisfied",
        }
    }

    /// Unknown values read as `NotSatisfied`.
    pub fn parse(s: &str) -> Self {
        match s {
            "satisfied" | "validated" => CompletionState::Satisfied,
            "in_progress" => CompletionState::InProgress,
            _ => CompletionState::NotSatisfied,
        }
    }
}
