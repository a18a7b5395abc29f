use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use figura_infra::config::{AppConfig, StorageConfig};
use figura_infra::db;
use figura_infra::graph_store::{InMemoryPrerequisiteStore, PostgresPrerequisiteStore, PrerequisiteStore};
use figura_infra::refresh::{
    RefreshConfig, RefreshScheduler, RefreshSchedulerHandle, RefreshSummary, SuggestionRefresher, SummaryBoard,
};
use figura_infra::services::{PrerequisiteService, SuggestionService};
use figura_infra::sources::postgres::{PgProgressionReader, PgSkillCatalog, PgSubjectDirectory};
use figura_infra::sources::{
    InMemoryProgression, InMemorySkillCatalog, InMemorySubjectDirectory, SeedData, Sources,
};
use figura_infra::suggestion_cache::{InMemorySuggestionCache, PostgresSuggestionCache, SuggestionCache};

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub prerequisites: PrerequisiteService,
    pub suggestions: SuggestionService,
    pub refresher: Arc<SuggestionRefresher>,
    pub refresh_board: SummaryBoard,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn PrerequisiteStore>,
        cache: Arc<dyn SuggestionCache>,
        sources: Sources,
        refresh: RefreshConfig,
    ) -> Self {
        Self {
            prerequisites: PrerequisiteService::new(store.clone(), sources.catalog.clone()),
            suggestions: SuggestionService::new(cache.clone(), store.clone(), sources.clone()),
            refresher: Arc::new(SuggestionRefresher::new(store, cache, sources, refresh)),
            refresh_board: SummaryBoard::new(),
        }
    }

    /// In-memory stores, with collaborators populated from an optional seed.
    pub async fn in_memory(seed: Option<&SeedData>, refresh: RefreshConfig) -> anyhow::Result<Self> {
        let catalog = Arc::new(InMemorySkillCatalog::new());
        let progression = Arc::new(InMemoryProgression::new());
        let directory = Arc::new(InMemorySubjectDirectory::new());
        let store = Arc::new(InMemoryPrerequisiteStore::new());

        if let Some(seed) = seed {
            seed.apply_sources(&catalog, &progression, &directory);
            let inserted = seed
                .apply_prerequisites(store.as_ref())
                .await
                .context("failed to apply seeded prerequisites")?;
            info!(tenants = seed.tenants.len(), edges = inserted, "applied seed data");
        }

        Ok(Self::new(
            store,
            Arc::new(InMemorySuggestionCache::new()),
            Sources::new(catalog, progression, directory),
            refresh,
        ))
    }

    /// Build from the loaded configuration (Postgres or in-memory).
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.storage {
            StorageConfig::InMemory { seed_file } => {
                info!("using in-memory stores");
                let seed = match seed_file {
                    Some(path) => Some(SeedData::load(path)?),
                    None => None,
                };
                Self::in_memory(seed.as_ref(), config.refresh.clone()).await
            }
            StorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                info!(max_connections, "using Postgres stores");
                let pool = db::connect(database_url, *max_connections)
                    .await
                    .context("failed to connect to Postgres")?;
                db::ensure_schema(&pool)
                    .await
                    .context("failed to prepare database schema")?;

                Ok(Self::new(
                    Arc::new(PostgresPrerequisiteStore::new(pool.clone())),
                    Arc::new(PostgresSuggestionCache::new(pool.clone())),
                    Sources::new(
                        Arc::new(PgSkillCatalog::new(pool.clone())),
                        Arc::new(PgProgressionReader::new(pool.clone())),
                        Arc::new(PgSubjectDirectory::new(pool)),
                    ),
                    config.refresh.clone(),
                ))
            }
        }
    }

    /// Start the periodic refresh; runs publish to `refresh_board`.
    pub fn spawn_scheduler(&self, interval: Duration) -> RefreshSchedulerHandle {
        RefreshScheduler::new(interval).spawn(self.refresher.clone(), self.refresh_board.clone())
    }

    /// One synchronous refresh run (admin trigger).
    pub async fn run_refresh(&self) -> RefreshSummary {
        let summary = self.refresher.run(chrono::Utc::now()).await;
        self.refresh_board.publish(summary.clone());
        summary
    }
}
