use serde::{Deserialize, Serialize};

use figura_core::SkillId;
use figura_graph::EdgeAttributes;
use figura_suggestions::DecisionOutcome;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddPrerequisiteRequest {
    pub parent: SkillId,
    pub prerequisite: SkillId,
    #[serde(default = "default_order")]
    pub order: u32,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u8,
}

impl AddPrerequisiteRequest {
    pub fn attributes(&self) -> EdgeAttributes {
        EdgeAttributes::new(self.order, self.required, self.weight)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrerequisiteRequest {
    pub order: u32,
    pub required: bool,
    pub weight: u8,
}

impl UpdatePrerequisiteRequest {
    pub fn attributes(&self) -> EdgeAttributes {
        EdgeAttributes::new(self.order, self.required, self.weight)
    }
}

fn default_order() -> u32 {
    1
}

fn default_required() -> bool {
    true
}

fn default_weight() -> u8 {
    figura_graph::MIN_WEIGHT
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub outcome: &'static str,
}

impl From<DecisionOutcome> for DecisionResponse {
    fn from(value: DecisionOutcome) -> Self {
        Self {
            outcome: value.as_str(),
        }
    }
}
