//! Cycle guard: run before every edge insertion.
//!
//! Inserting `parent -> prerequisite` closes a cycle exactly when `parent` is
//! already reachable from `prerequisite` by following prerequisite edges
//! forward. The search is an iterative DFS with a visited set, so every node
//! is expanded at most once and cost is linear in the number of edges.

use figura_core::SkillId;

use crate::adjacency::PrerequisiteGraph;
use crate::edge::PrerequisiteEdge;
use crate::error::GraphError;

/// Why an insertion was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Parent of the rejected edge.
    pub parent: SkillId,
    /// Prerequisite of the rejected edge.
    pub prerequisite: SkillId,
    /// Skill that already requires `parent` on the path back from `prerequisite`.
    pub conflicting: SkillId,
    /// Existing path `prerequisite -> ... -> parent`.
    pub path: Vec<SkillId>,
}

impl core::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.parent == self.prerequisite {
            return write!(f, "skill {} cannot be its own prerequisite", self.parent);
        }
        write!(
            f,
            "adding {} as a prerequisite of {} would create a cycle: {} already requires {}",
            self.prerequisite, self.parent, self.conflicting, self.parent
        )
    }
}

/// Returns the cycle that `parent -> prerequisite` would close, if any.
pub fn would_create_cycle(
    graph: &PrerequisiteGraph,
    parent: SkillId,
    prerequisite: SkillId,
) -> Option<CycleReport> {
    if parent == prerequisite {
        return Some(CycleReport {
            parent,
            prerequisite,
            conflicting: parent,
            path: vec![parent],
        });
    }

    let start = graph.node_index(prerequisite)?;
    let target = graph.node_index(parent)?;

    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut came_from: Vec<Option<usize>> = vec![None; n];
    let mut stack = vec![start];
    visited[start] = true;

    while let Some(node) = stack.pop() {
        if node == target {
            let path = unwind(graph, &came_from, target);
            let conflicting = path[path.len() - 2];
            return Some(CycleReport {
                parent,
                prerequisite,
                conflicting,
                path,
            });
        }
        for next in graph.successors(node) {
            if !visited[next] {
                visited[next] = true;
                came_from[next] = Some(node);
                stack.push(next);
            }
        }
    }

    None
}

fn unwind(graph: &PrerequisiteGraph, came_from: &[Option<usize>], target: usize) -> Vec<SkillId> {
    let mut path = vec![graph.node(target)];
    let mut cursor = target;
    while let Some(prev) = came_from[cursor] {
        path.push(graph.node(prev));
        cursor = prev;
    }
    path.reverse();
    path
}

/// Full pre-insert validation: attributes, duplicate pair, cycle.
pub fn check_insert(graph: &PrerequisiteGraph, edge: &PrerequisiteEdge) -> Result<(), GraphError> {
    edge.attributes().validate()?;

    if graph.contains(edge.key()) {
        return Err(GraphError::DuplicateEdge {
            parent: edge.parent,
            prerequisite: edge.prerequisite,
        });
    }

    match would_create_cycle(graph, edge.parent, edge.prerequisite) {
        Some(report) => Err(GraphError::CycleDetected(report)),
        None => Ok(()),
    }
}
