//! Batch-friendly scoring over a loaded graph snapshot.
//!
//! The refresh orchestrator loads a tenant's edges once and a subject's
//! completion states once, then scores every candidate against them.

use std::collections::{BTreeSet, HashMap};

use figura_core::SkillId;
use figura_graph::PrerequisiteGraph;

use crate::completion::CompletionState;
use crate::score::{breakdown, compute_readiness, NotApplicable, PrerequisiteProgress, Readiness};

#[derive(Debug, Clone, Copy)]
pub struct PreparationScoreCalculator<'a> {
    graph: &'a PrerequisiteGraph,
    completion: &'a HashMap<SkillId, CompletionState>,
}

impl<'a> PreparationScoreCalculator<'a> {
    pub fn new(graph: &'a PrerequisiteGraph, completion: &'a HashMap<SkillId, CompletionState>) -> Self {
        Self { graph, completion }
    }

    /// Missing entries are `NotSatisfied`.
    pub fn state(&self, skill: SkillId) -> CompletionState {
        self.completion.get(&skill).copied().unwrap_or_default()
    }

    pub fn compute_score(&self, candidate: SkillId) -> Result<Readiness, NotApplicable> {
        compute_readiness(&self.graph.edges_for(candidate), |s| self.state(s))
    }

    pub fn breakdown(&self, candidate: SkillId) -> Vec<PrerequisiteProgress> {
        breakdown(&self.graph.edges_for(candidate), |s| self.state(s))
    }

    /// Skills whose completion state is needed to score `candidates`:
    /// the candidates themselves plus all their direct prerequisites.
    pub fn skills_needed(graph: &PrerequisiteGraph, candidates: &[SkillId]) -> Vec<SkillId> {
        let mut needed: BTreeSet<SkillId> = candidates.iter().copied().collect();
        for candidate in candidates {
            needed.extend(graph.edges_for(*candidate).iter().map(|e| e.prerequisite));
        }
        needed.into_iter().collect()
    }
}
