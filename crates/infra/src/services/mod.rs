//! Application services: validation, name resolution and error mapping on
//! top of the stores and sources.

pub mod prerequisites;
pub mod scoring;
pub mod suggestions;

pub use prerequisites::{EdgeView, NamedCycle, PrerequisiteError, PrerequisiteService, SkillRef};
pub use scoring::{ScoreCalculator, ScoreError};
pub use suggestions::{
    PlanChange, PlanChangeKind, PrerequisiteRow, SuggestionDetail, SuggestionError, SuggestionService, SuggestionView,
};
