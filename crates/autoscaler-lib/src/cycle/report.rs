//! Per-cycle report returned by the runner and served at `/cycles/last`

use super::AbortReason;
use crate::engine::{ResizePlan, SkipReason};
use crate::error::ClaimErrorKind;
use crate::models::ClaimId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one claim during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Resized(ResizePlan),
    /// Resize computed but not written
    DryRun(ResizePlan),
    Skipped { reason: SkipReason },
    Failed { kind: ClaimErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub claim: ClaimId,
    #[serde(flatten)]
    pub outcome: ClaimOutcome,
}

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Claims returned by discovery
    pub discovered: usize,
    /// Outcomes in processing order. Shorter than `discovered` when aborted.
    pub claims: Vec<ClaimReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
}

impl Default for CycleReport {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            discovered: 0,
            claims: Vec::new(),
            aborted: None,
        }
    }
}

impl CycleReport {
    pub(crate) fn started(at: DateTime<Utc>, discovered: usize) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            discovered,
            claims: Vec::with_capacity(discovered),
            aborted: None,
        }
    }

    pub(crate) fn push(&mut self, claim: ClaimId, outcome: ClaimOutcome) {
        self.claims.push(ClaimReport { claim, outcome });
    }

    fn count(&self, pred: impl Fn(&ClaimOutcome) -> bool) -> usize {
        self.claims.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn resized(&self) -> usize {
        self.count(|o| matches!(o, ClaimOutcome::Resized(_)))
    }

    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, ClaimOutcome::DryRun(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ClaimOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ClaimOutcome::Failed { .. }))
    }

    /// Outcome recorded for a claim, if it was processed
    pub fn outcome(&self, claim: &ClaimId) -> Option<&ClaimOutcome> {
        self.claims
            .iter()
            .find(|c| &c.claim == claim)
            .map(|c| &c.outcome)
    }
}
