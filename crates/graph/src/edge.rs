use serde::{Deserialize, Serialize};

use figura_core::SkillId;

use crate::error::GraphError;

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 3;

/// Identity of an edge: `parent` requires `prerequisite`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub parent: SkillId,
    pub prerequisite: SkillId,
}

impl EdgeKey {
    pub fn new(parent: SkillId, prerequisite: SkillId) -> Self {
        Self { parent, prerequisite }
    }
}

/// Mutable attributes of an edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    /// Display / learning sequence, starting at 1.
    pub order: u32,
    /// Required edges count toward the readiness denominator.
    pub required: bool,
    /// Relative importance within the denominator.
    pub weight: u8,
}

impl EdgeAttributes {
    pub fn new(order: u32, required: bool, weight: u8) -> Self {
        Self { order, required, weight }
    }

    /// Validate authored attributes.
    ///
    /// Only applied on administrative input; rows already persisted are trusted.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.order == 0 {
            return Err(GraphError::InvalidEdge("order must be a positive integer".to_string()));
        }
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&self.weight) {
            return Err(GraphError::InvalidEdge(format!(
                "weight must be between {MIN_WEIGHT} and {MAX_WEIGHT} (got {})",
                self.weight
            )));
        }
        Ok(())
    }
}

/// A persisted prerequisite edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub parent: SkillId,
    pub prerequisite: SkillId,
    pub order: u32,
    pub required: bool,
    pub weight: u8,
}

impl PrerequisiteEdge {
    pub fn new(key: EdgeKey, attrs: EdgeAttributes) -> Self {
        Self {
            parent: key.parent,
            prerequisite: key.prerequisite,
            order: attrs.order,
            required: attrs.required,
            weight: attrs.weight,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.parent, self.prerequisite)
    }

    pub fn attributes(&self) -> EdgeAttributes {
        EdgeAttributes::new(self.order, self.required, self.weight)
    }

    pub fn with_attributes(mut self, attrs: EdgeAttributes) -> Self {
        self.order = attrs.order;
        self.required = attrs.required;
        self.weight = attrs.weight;
        self
    }
}
