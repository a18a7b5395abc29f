//! Prerequisite graph domain (pure).
//!
//! Skills declare other skills as weighted prerequisites. The edge set must
//! stay a DAG; this crate owns edge validation, the in-memory adjacency arena
//! used for traversal, and the cycle guard run before every insertion.
//! Persistence lives in `figura-infra`.

pub mod adjacency;
pub mod cycle;
pub mod edge;
pub mod error;

pub use adjacency::PrerequisiteGraph;
pub use cycle::{check_insert, would_create_cycle, CycleReport};
pub use edge::{EdgeAttributes, EdgeKey, PrerequisiteEdge, MAX_WEIGHT, MIN_WEIGHT};
pub use error::GraphError;
