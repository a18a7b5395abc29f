//! `figura-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the learner/group `Subject`, and the shared
//! domain error model.

pub mod error;
pub mod id;
pub mod subject;

pub use error::{DomainError, DomainResult};
pub use id::{GroupId, LearnerId, SkillId, TenantId};
pub use subject::Subject;
