use thiserror::Error;

use figura_core::SkillId;

use crate::cycle::CycleReport;

/// Structural violations of the prerequisite graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{0}")]
    CycleDetected(CycleReport),

    #[error("prerequisite edge {parent} -> {prerequisite} already exists")]
    DuplicateEdge { parent: SkillId, prerequisite: SkillId },

    #[error("prerequisite edge {parent} -> {prerequisite} not found")]
    EdgeNotFound { parent: SkillId, prerequisite: SkillId },

    #[error("invalid prerequisite edge: {0}")]
    InvalidEdge(String),
}
