//! Arena-backed adjacency structure for a tenant's prerequisite edges.
//!
//! Built from a loaded edge subset, traversed, then dropped. Nodes live in a
//! `Vec` and edge lists refer to them by index, so traversals never go back to
//! storage per visited node.

use std::collections::HashMap;

use figura_core::SkillId;

use crate::edge::{EdgeKey, PrerequisiteEdge};

/// Directed prerequisite graph: `parent -> prerequisite`.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    nodes: Vec<SkillId>,
    index: HashMap<SkillId, usize>,
    edges: Vec<PrerequisiteEdge>,
    /// Per node: indices into `edges` where the node is the parent.
    outgoing: Vec<Vec<usize>>,
    /// Per node: indices into `edges` where the node is the prerequisite.
    incoming: Vec<Vec<usize>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = PrerequisiteEdge>,
    {
        let mut graph = Self::new();
        for edge in edges {
            graph.insert(edge);
        }
        graph
    }

    fn intern(&mut self, skill: SkillId) -> usize {
        if let Some(&ix) = self.index.get(&skill) {
            return ix;
        }
        let ix = self.nodes.len();
        self.nodes.push(skill);
        self.index.insert(skill, ix);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        ix
    }

    /// Add an edge without any structural check.
    ///
    /// Callers go through `cycle::check_insert` first.
    pub fn insert(&mut self, edge: PrerequisiteEdge) {
        let parent = self.intern(edge.parent);
        let prerequisite = self.intern(edge.prerequisite);
        let slot = self.edges.len();
        self.edges.push(edge);
        self.outgoing[parent].push(slot);
        self.incoming[prerequisite].push(slot);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn node_index(&self, skill: SkillId) -> Option<usize> {
        self.index.get(&skill).copied()
    }

    pub(crate) fn node(&self, ix: usize) -> SkillId {
        self.nodes[ix]
    }

    /// Node indices of the direct prerequisites of `ix`.
    pub(crate) fn successors(&self, ix: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing[ix]
            .iter()
            .filter_map(move |&slot| self.node_index(self.edges[slot].prerequisite))
    }

    pub fn contains(&self, key: EdgeKey) -> bool {
        self.node_index(key.parent).is_some_and(|ix| {
            self.outgoing[ix]
                .iter()
                .any(|&slot| self.edges[slot].prerequisite == key.prerequisite)
        })
    }

    /// Edges where `parent` is the dependent skill, by `(order, prerequisite)`.
    pub fn edges_for(&self, parent: SkillId) -> Vec<PrerequisiteEdge> {
        let mut out: Vec<PrerequisiteEdge> = match self.node_index(parent) {
            Some(ix) => self.outgoing[ix].iter().map(|&slot| self.edges[slot]).collect(),
            None => Vec::new(),
        };
        out.sort_by_key(|e| (e.order, e.prerequisite));
        out
    }

    /// Edges where `prerequisite` is required by another skill, by parent.
    pub fn reverse_edges_for(&self, prerequisite: SkillId) -> Vec<PrerequisiteEdge> {
        let mut out: Vec<PrerequisiteEdge> = match self.node_index(prerequisite) {
            Some(ix) => self.incoming[ix].iter().map(|&slot| self.edges[slot]).collect(),
            None => Vec::new(),
        };
        out.sort_by_key(|e| e.parent);
        out
    }

    /// Required edges of `parent`, in edge order.
    pub fn required_edges_for(&self, parent: SkillId) -> Vec<PrerequisiteEdge> {
        self.edges_for(parent).into_iter().filter(|e| e.required).collect()
    }

    /// Skills that have at least one required prerequisite, sorted by id.
    pub fn skills_with_required_prerequisites(&self) -> Vec<SkillId> {
        let mut out: Vec<SkillId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(ix, _)| self.outgoing[*ix].iter().any(|&slot| self.edges[slot].required))
            .map(|(_, skill)| *skill)
            .collect();
        out.sort();
        out
    }

    pub fn edges(&self) -> &[PrerequisiteEdge] {
        &self.edges
    }
}
