use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use figura_core::{SkillId, Subject, TenantId};

use crate::score::{Readiness, Score};
use crate::status::{SuggestionStatus, TransitionError};

/// A cached suggestion, keyed by `(tenant_id, subject, skill_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub tenant_id: TenantId,
    pub subject: Subject,
    /// The candidate skill being suggested.
    pub skill_id: SkillId,
    pub score: Score,
    pub satisfied_count: u32,
    pub required_total: u32,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What a refresh pass did to one entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "status")]
pub enum RefreshOutcome {
    Created,
    Refreshed,
    /// The entry carries a user decision and was left untouched.
    Skipped(SuggestionStatus),
}

/// A user (or learning-plan) decision on a suggestion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Dismiss,
    /// Return to `pending` (plan removal, un-hide).
    Reset,
}

impl Decision {
    pub fn target(self) -> SuggestionStatus {
        match self {
            Decision::Accept => SuggestionStatus::Accepted,
            Decision::Dismiss => SuggestionStatus::Dismissed,
            Decision::Reset => SuggestionStatus::Pending,
        }
    }
}

/// Result of a decision that did not violate the lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Applied,
    /// The entry was already in the requested state.
    Unchanged,
    /// The suggestion expired or was superseded; nothing to decide on.
    NoLongerAvailable,
}

impl DecisionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionOutcome::Applied => "applied",
            DecisionOutcome::Unchanged => "unchanged",
            DecisionOutcome::NoLongerAvailable => "no_longer_available",
        }
    }
}

impl SuggestionEntry {
    pub fn pending(
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            tenant_id,
            subject,
            skill_id,
            score: readiness.score,
            satisfied_count: readiness.satisfied_count,
            required_total: readiness.required_total,
            status: SuggestionStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// An entry for a skill the subject put in a learning plan.
    ///
    /// Created accepted; decided entries never expire, so `expires_at` is
    /// only a record of when it was planned.
    pub fn planned(
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: SuggestionStatus::Accepted,
            ..Self::pending(tenant_id, subject, skill_id, readiness, now, Duration::zero())
        }
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            score: self.score,
            satisfied_count: self.satisfied_count,
            required_total: self.required_total,
        }
    }

    /// Only pending entries expire; decided entries persist until reset.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SuggestionStatus::Pending && now >= self.expires_at
    }

    /// Visible in the learner's pending list.
    pub fn is_listed(&self, now: DateTime<Utc>) -> bool {
        self.status == SuggestionStatus::Pending && !self.is_expired(now)
    }

    /// Overwrite a pending entry with freshly computed values.
    pub fn refresh(&mut self, readiness: Readiness, now: DateTime<Utc>, ttl: Duration) -> RefreshOutcome {
        if self.status.is_decided() {
            return RefreshOutcome::Skipped(self.status);
        }
        self.score = readiness.score;
        self.satisfied_count = readiness.satisfied_count;
        self.required_total = readiness.required_total;
        self.updated_at = now;
        self.expires_at = now + ttl;
        RefreshOutcome::Refreshed
    }

    /// Apply a decision. The entry is unchanged on any non-`Applied` result.
    pub fn decide(
        &mut self,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, TransitionError> {
        let target = decision.target();

        if decision != Decision::Reset && self.is_expired(now) {
            return Ok(DecisionOutcome::NoLongerAvailable);
        }
        if self.status == target {
            return Ok(DecisionOutcome::Unchanged);
        }

        self.status = self.status.transition(target)?;
        self.updated_at = now;
        Ok(DecisionOutcome::Applied)
    }

    /// The skill entered a learning plan: accepted regardless of expiry or
    /// an earlier dismissal.
    pub fn mark_planned(&mut self, now: DateTime<Utc>) -> DecisionOutcome {
        if self.status == SuggestionStatus::Accepted {
            return DecisionOutcome::Unchanged;
        }
        self.status = SuggestionStatus::Accepted;
        self.updated_at = now;
        DecisionOutcome::Applied
    }
}
