//! Preparation (readiness) score.
//!
//! `score = 100 * Σ weight(satisfied required) / Σ weight(required)`, rounded
//! half-up to two decimals. Optional prerequisites never enter the ratio; they
//! only show up in the per-prerequisite breakdown.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use figura_core::SkillId;
use figura_graph::PrerequisiteEdge;

use crate::completion::CompletionState;

/// Score in hundredths of a percent, `0..=10_000` (0.00 to 100.00).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Score(u16);

impl Score {
    pub const MAX: Score = Score(10_000);

    pub fn from_hundredths(hundredths: u16) -> Option<Self> {
        (hundredths <= Self::MAX.0).then_some(Self(hundredths))
    }

    pub fn hundredths(self) -> u16 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl core::fmt::Display for Score {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        if !(0.0..=100.0).contains(&raw) {
            return Err(serde::de::Error::custom(format!("score out of range: {raw}")));
        }
        Ok(Score((raw * 100.0).round() as u16))
    }
}

/// Computed readiness of a subject for one candidate skill.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub score: Score,
    /// Required prerequisites satisfied (unweighted).
    pub satisfied_count: u32,
    /// Required prerequisites in total (unweighted).
    pub required_total: u32,
}

impl Readiness {
    /// Stored for a planned skill that has no required prerequisites.
    pub const UNSCORED: Readiness = Readiness {
        score: Score(0),
        satisfied_count: 0,
        required_total: 0,
    };
}

/// The candidate cannot be scored and is left out of suggestions.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum NotApplicable {
    #[error("candidate has no required prerequisites")]
    NoRequiredPrerequisites,

    #[error("required prerequisites carry no weight")]
    ZeroWeight,
}

/// Score `edges` (all edges whose parent is the candidate) against `state`.
pub fn compute_readiness<F>(edges: &[PrerequisiteEdge], state: F) -> Result<Readiness, NotApplicable>
where
    F: Fn(SkillId) -> CompletionState,
{
    let mut required_total: u32 = 0;
    let mut satisfied_count: u32 = 0;
    let mut total_weight: u64 = 0;
    let mut satisfied_weight: u64 = 0;

    for edge in edges.iter().filter(|e| e.required) {
        required_total += 1;
        total_weight += u64::from(edge.weight);
        if state(edge.prerequisite).is_satisfied() {
            satisfied_count += 1;
            satisfied_weight += u64::from(edge.weight);
        }
    }

    if required_total == 0 {
        return Err(NotApplicable::NoRequiredPrerequisites);
    }
    if total_weight == 0 {
        return Err(NotApplicable::ZeroWeight);
    }

    // Integer half-up rounding of 10_000 * sw / tw.
    let hundredths = (20_000 * satisfied_weight + total_weight) / (2 * total_weight);

    Ok(Readiness {
        score: Score(hundredths as u16),
        satisfied_count,
        required_total,
    })
}

/// One row of the per-prerequisite detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteProgress {
    pub skill_id: SkillId,
    pub order: u32,
    pub required: bool,
    pub weight: u8,
    pub state: CompletionState,
}

/// Every prerequisite of the candidate, required and optional, in edge order.
pub fn breakdown<F>(edges: &[PrerequisiteEdge], state: F) -> Vec<PrerequisiteProgress>
where
    F: Fn(SkillId) -> CompletionState,
{
    let mut rows: Vec<PrerequisiteProgress> = edges
        .iter()
        .map(|e| PrerequisiteProgress {
            skill_id: e.prerequisite,
            order: e.order,
            required: e.required,
            weight: e.weight,
            state: state(e.prerequisite),
        })
        .collect();
    rows.sort_by_key(|r| (r.order, r.skill_id));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use figura_graph::{EdgeAttributes, EdgeKey};
    use proptest::prelude::*;

    fn edge(parent: SkillId, prerequisite: SkillId, required: bool, weight: u8) -> PrerequisiteEdge {
        PrerequisiteEdge::new(
            EdgeKey::new(parent, prerequisite),
            EdgeAttributes::new(1, required, weight),
        )
    }

    fn satisfied(set: &HashSet<SkillId>) -> impl Fn(SkillId) -> CompletionState + '_ {
        move |s| {
            if set.contains(&s) {
                CompletionState::Satisfied
            } else {
                CompletionState::NotSatisfied
            }
        }
    }

    #[test]
    fn weighted_score_rounds_to_two_decimals() {
        // ATR-mur requires Gainage (2) and Equilibre-mains (1); Gainage is done.
        let atr_mur = SkillId::new();
        let gainage = SkillId::new();
        let equilibre = SkillId::new();
        let edges = vec![edge(atr_mur, gainage, true, 2), edge(atr_mur, equilibre, true, 1)];
        let done: HashSet<SkillId> = [gainage].into_iter().collect();

        let r = compute_readiness(&edges, satisfied(&done)).unwrap();
        assert_eq!(r.satisfied_count, 1);
        assert_eq!(r.required_total, 2);
        assert_eq!(r.score.hundredths(), 6667);
        assert_eq!(r.score.to_string(), "66.67");
    }

    #[test]
    fn in_progress_counts_as_not_satisfied() {
        let c = SkillId::new();
        let p = SkillId::new();
        let edges = vec![edge(c, p, true, 1)];
        let r = compute_readiness(&edges, |_| CompletionState::InProgress).unwrap();
        assert_eq!(r.score, Score::default());
        assert_eq!(r.satisfied_count, 0);
    }

    #[test]
    fn optional_prerequisites_do_not_move_the_score() {
        let c = SkillId::new();
        let (req, opt) = (SkillId::new(), SkillId::new());
        let edges = vec![edge(c, req, true, 1), edge(c, opt, false, 3)];
        let done: HashSet<SkillId> = [opt].into_iter().collect();

        let r = compute_readiness(&edges, satisfied(&done)).unwrap();
        assert_eq!(r.score.hundredths(), 0);
        assert_eq!(r.required_total, 1);
    }

    #[test]
    fn no_required_edges_is_not_applicable() {
        let c = SkillId::new();
        let edges = vec![edge(c, SkillId::new(), false, 2)];
        assert_eq!(
            compute_readiness(&edges, |_| CompletionState::Satisfied),
            Err(NotApplicable::NoRequiredPrerequisites)
        );
        assert_eq!(
            compute_readiness(&[], |_| CompletionState::Satisfied),
            Err(NotApplicable::NoRequiredPrerequisites)
        );
    }

    #[test]
    fn zero_total_weight_is_not_applicable() {
        let c = SkillId::new();
        let edges = vec![edge(c, SkillId::new(), true, 0), edge(c, SkillId::new(), true, 0)];
        assert_eq!(
            compute_readiness(&edges, |_| CompletionState::Satisfied),
            Err(NotApplicable::ZeroWeight)
        );
    }

    #[test]
    fn breakdown_lists_optional_rows_in_order() {
        let c = SkillId::new();
        let (a, b) = (SkillId::new(), SkillId::new());
        let mut first = edge(c, b, false, 1);
        first.order = 1;
        let mut second = edge(c, a, true, 2);
        second.order = 2;

        let rows = breakdown(&[second, first], |s| {
            if s == a { CompletionState::InProgress } else { CompletionState::NotSatisfied }
        });
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].skill_id, b);
        assert!(!rows[0].required);
        assert_eq!(rows[1].state, CompletionState::InProgress);
    }

    #[test]
    fn score_serializes_as_decimal_number() {
        let s = Score::from_hundredths(8500).unwrap();
        assert_eq!(serde_json::to_value(s).unwrap(), serde_json::json!(85.0));
        let back: Score = serde_json::from_value(serde_json::json!(66.67)).unwrap();
        assert_eq!(back.hundredths(), 6667);
        assert!(Score::from_hundredths(10_001).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: 0 <= score <= 100 and satisfied_count <= required_total.
        #[test]
        fn score_is_bounded(
            spec in prop::collection::vec((any::<bool>(), 1u8..=3, any::<bool>()), 1..12)
        ) {
            let c = SkillId::new();
            let mut done = HashSet::new();
            let mut edges = vec![edge(c, SkillId::new(), true, 1)];
            for (required, weight, is_done) in spec {
                let p = SkillId::new();
                if is_done {
                    done.insert(p);
                }
                edges.push(edge(c, p, required, weight));
            }

            let r = compute_readiness(&edges, satisfied(&done)).unwrap();
            prop_assert!(r.score <= Score::MAX);
            prop_assert!(r.satisfied_count <= r.required_total);
        }

        /// Property: satisfying one more required prerequisite never lowers the score.
        #[test]
        fn score_is_monotonic(
            weights in prop::collection::vec(1u8..=3, 1..10),
            done_mask in prop::collection::vec(any::<bool>(), 10),
            extra in 0usize..10,
        ) {
            let c = SkillId::new();
            let prereqs: Vec<SkillId> = weights.iter().map(|_| SkillId::new()).collect();
            let edges: Vec<PrerequisiteEdge> = prereqs
                .iter()
                .zip(&weights)
                .map(|(p, w)| edge(c, *p, true, *w))
                .collect();

            let before: HashSet<SkillId> = prereqs
                .iter()
                .zip(&done_mask)
                .filter(|(_, d)| **d)
                .map(|(p, _)| *p)
                .collect();
            let mut after = before.clone();
            after.insert(prereqs[extra % prereqs.len()]);

            let lo = compute_readiness(&edges, satisfied(&before)).unwrap();
            let hi = compute_readiness(&edges, satisfied(&after)).unwrap();
            prop_assert!(hi.score >= lo.score);
        }
    }
}
