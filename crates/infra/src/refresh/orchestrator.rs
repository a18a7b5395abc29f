use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use figura_core::{SkillId, Subject, TenantId};
use figura_graph::PrerequisiteGraph;
use figura_suggestions::{PreparationScoreCalculator, Readiness, RefreshOutcome};

use super::summary::{CandidateFailure, RefreshSummary, SubjectOutcome, SubjectReport, SubjectResult};
use super::{backoff, RefreshConfig, RefreshError};
use crate::graph_store::PrerequisiteStore;
use crate::sources::{ProgressionReader, Sources};
use crate::suggestion_cache::SuggestionCache;

/// Repopulates the suggestion cache for every subject of every tenant.
///
/// The only writer of pending entries.
#[derive(Clone)]
pub struct SuggestionRefresher {
    store: Arc<dyn PrerequisiteStore>,
    cache: Arc<dyn SuggestionCache>,
    sources: Sources,
    config: RefreshConfig,
}

impl core::fmt::Debug for SuggestionRefresher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuggestionRefresher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything a subject unit needs, shared read-only across workers.
struct TenantUnit {
    tenant_id: TenantId,
    graph: PrerequisiteGraph,
    /// Sorted by id.
    candidates: Vec<SkillId>,
    cache: Arc<dyn SuggestionCache>,
    progression: Arc<dyn ProgressionReader>,
    config: RefreshConfig,
    now: DateTime<Utc>,
}

impl SuggestionRefresher {
    pub fn new(
        store: Arc<dyn PrerequisiteStore>,
        cache: Arc<dyn SuggestionCache>,
        sources: Sources,
        config: RefreshConfig,
    ) -> Self {
        Self {
            store,
            cache,
            sources,
            config,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// One full batch run. Never fails: every failure ends up in the summary.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, now: DateTime<Utc>) -> RefreshSummary {
        let run_id = Uuid::now_v7();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();
        let mut summary = RefreshSummary::new(run_id, now);
        info!(%run_id, "suggestion refresh started");

        let tenants = match self.sources.directory.tenants().await {
            Ok(t) => t,
            Err(e) => {
                warn!(%run_id, error = %e, "suggestion refresh could not enumerate tenants");
                summary.directory_error = Some(e.to_string());
                summary.finish(0, started.elapsed());
                return summary;
            }
        };

        for tenant_id in &tenants {
            match self.refresh_tenant(*tenant_id, now).await {
                Ok(outcomes) => summary.outcomes.extend(outcomes),
                Err(e) => {
                    warn!(%run_id, tenant = %tenant_id, error = %e, "tenant skipped by suggestion refresh");
                    summary.tenant_failures.push(super::TenantFailure {
                        tenant_id: *tenant_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.finish(tenants.len() as u32, started.elapsed());
        let t = summary.totals;
        info!(
            %run_id,
            tenants = t.tenants,
            tenants_failed = t.tenants_failed,
            processed = t.subjects_processed,
            failed = t.subjects_failed,
            candidates_failed = t.candidates_failed,
            created = t.created,
            refreshed = t.refreshed,
            skipped_decided = t.skipped_decided,
            superseded_removed = t.superseded_removed,
            elapsed_ms = summary.elapsed_ms,
            "suggestion refresh finished"
        );
        summary
    }

    /// Refresh every subject of one tenant with bounded parallelism.
    ///
    /// Fails only when the tenant itself cannot be loaded.
    #[instrument(skip(self, now), fields(tenant = %tenant_id))]
    pub async fn refresh_tenant(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SubjectOutcome>, RefreshError> {
        let unit = Arc::new(self.load_tenant(tenant_id, now).await?);
        let subjects = self.sources.directory.subjects(tenant_id).await?;
        debug!(
            subjects = subjects.len(),
            candidates = unit.candidates.len(),
            edges = unit.graph.edge_count(),
            "tenant loaded for refresh"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let unit = unit.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                unit.refresh_with_retry(subject).await
            });
            handles.push((subject, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (subject, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(subject = %subject, error = %e, "refresh worker aborted");
                    SubjectOutcome {
                        tenant_id,
                        subject,
                        attempts: 1,
                        result: SubjectResult::Failed {
                            error: RefreshError::Worker(e.to_string()).to_string(),
                        },
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn load_tenant(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<TenantUnit, RefreshError> {
        let graph = self.store.snapshot(tenant_id).await?;
        let catalog: HashSet<SkillId> = self
            .sources
            .catalog
            .skills(tenant_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let candidates = graph
            .skills_with_required_prerequisites()
            .into_iter()
            .filter(|skill| catalog.contains(skill))
            .collect();

        Ok(TenantUnit {
            tenant_id,
            graph,
            candidates,
            cache: self.cache.clone(),
            progression: self.sources.progression.clone(),
            config: self.config.clone(),
            now,
        })
    }
}

impl TenantUnit {
    async fn refresh_with_retry(&self, subject: Subject) -> SubjectOutcome {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.config.subject_timeout, self.refresh_once(subject)).await {
                Ok(result) => result,
                Err(_) => Err(RefreshError::TimedOut(self.config.subject_timeout)),
            };

            match result {
                Ok(report) => {
                    debug!(
                        tenant = %self.tenant_id,
                        subject = %subject,
                        attempt,
                        created = report.created,
                        refreshed = report.refreshed,
                        "subject refreshed"
                    );
                    return SubjectOutcome {
                        tenant_id: self.tenant_id,
                        subject,
                        attempts: attempt,
                        result: SubjectResult::Refreshed(report),
                    };
                }
                Err(e) if attempt < self.config.max_attempts => {
                    let delay = backoff(self.config.base_backoff, attempt);
                    warn!(
                        tenant = %self.tenant_id,
                        subject = %subject,
                        attempt,
                        error = %e,
                        backoff_ms = delay.as_millis() as u64,
                        "subject refresh failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        tenant = %self.tenant_id,
                        subject = %subject,
                        attempts = attempt,
                        error = %e,
                        "subject refresh failed"
                    );
                    return SubjectOutcome {
                        tenant_id: self.tenant_id,
                        subject,
                        attempts: attempt,
                        result: SubjectResult::Failed { error: e.to_string() },
                    };
                }
            }
        }
    }

    /// One attempt. Safe to repeat: upserts and the superseded sweep are idempotent.
    async fn refresh_once(&self, subject: Subject) -> Result<SubjectReport, RefreshError> {
        let mut report = SubjectReport {
            candidates: self.candidates.len() as u32,
            ..SubjectReport::default()
        };

        let needed = PreparationScoreCalculator::skills_needed(&self.graph, &self.candidates);
        let completion = self
            .progression
            .completion(self.tenant_id, subject, &needed)
            .await?;
        let calculator = PreparationScoreCalculator::new(&self.graph, &completion);

        let mut scored: Vec<(SkillId, Readiness)> = Vec::new();
        for candidate in &self.candidates {
            if calculator.state(*candidate).is_satisfied() {
                report.already_satisfied += 1;
                continue;
            }
            match calculator.compute_score(*candidate) {
                Ok(readiness) => scored.push((*candidate, readiness)),
                Err(_) => report.not_applicable += 1,
            }
        }

        scored.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        let cap = self.config.max_suggestions_per_subject;
        if scored.len() > cap {
            report.capped = (scored.len() - cap) as u32;
            scored.truncate(cap);
        }

        for (skill_id, readiness) in &scored {
            let written = self
                .cache
                .upsert_pending(self.tenant_id, subject, *skill_id, *readiness, self.now, self.config.ttl)
                .await;
            match written {
                Ok(RefreshOutcome::Created) => report.created += 1,
                Ok(RefreshOutcome::Refreshed) => report.refreshed += 1,
                Ok(RefreshOutcome::Skipped(_)) => report.skipped_decided += 1,
                Err(e) => {
                    warn!(
                        tenant = %self.tenant_id,
                        subject = %subject,
                        skill = %skill_id,
                        error = %e,
                        "suggestion upsert failed"
                    );
                    report.candidate_failures.push(CandidateFailure {
                        skill_id: *skill_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let keep: Vec<SkillId> = scored.iter().map(|(skill, _)| *skill).collect();
        report.superseded_removed = self.cache.retain_candidates(self.tenant_id, subject, &keep).await?;

        Ok(report)
    }
}
