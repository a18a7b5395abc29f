//! Infrastructure layer: prerequisite and suggestion stores, upstream
//! sources, batch refresh and configuration.

pub mod config;
#[cfg(feature = "postgres")]
pub mod db;
pub mod error;
pub mod graph_store;
pub mod refresh;
pub mod services;
pub mod sources;
pub mod suggestion_cache;

pub use config::{AppConfig, ConfigError, StorageConfig};
pub use error::{DecisionError, EdgeWriteError, SourceError, StoreError};
pub use graph_store::{InMemoryPrerequisiteStore, PrerequisiteStore};
pub use refresh::{RefreshConfig, RefreshScheduler, RefreshSchedulerHandle, RefreshSummary, SuggestionRefresher, SummaryBoard};
pub use sources::Sources;
pub use suggestion_cache::{InMemorySuggestionCache, SuggestionCache};
