//! Reconciliation cycles
//!
//! The decision engine is pure; this module is the thin async shell around it.
//! Discovery, metrics, storage-class lookups and the persisted write are all
//! behind collaborator traits so the runner can be driven by Kubernetes and
//! Prometheus in production and by in-memory mocks in tests.

mod reconciler;
mod report;
mod runner;


pub use reconciler::{ReconcileConfig, Reconciler, ReconcilerBuilder, SharedReport};
pub use report::{ClaimOutcome, ClaimReport, CycleReport};
pub use runner::{CycleRunner, CycleRunnerBuilder};

use crate::engine::ResizePlan;
use crate::models::{ClaimId, ClaimRecord, VolumeClaimSnapshot, VolumeMetrics};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::time::Instant;

pub use async_trait::async_trait;

/// Lists the claims the controller manages
#[async_trait]
pub trait ClaimSource: Send + Sync {
    async fn list_claims(&self) -> Result<Vec<ClaimRecord>>;
}

/// Point-in-time volume usage for every claim that reports it
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// A missing entry means the claim has no metrics this cycle
    async fn fetch_metrics(&self, at: DateTime<Utc>) -> Result<HashMap<ClaimId, VolumeMetrics>>;
}

/// Storage class capability lookups
#[async_trait]
pub trait StorageClassSource: Send + Sync {
    async fn allows_expansion(&self, storage_class: &str) -> Result<bool>;
}

/// Persists a resize. Conflicts surface as errors and are never retried here.
#[async_trait]
pub trait ClaimUpdater: Send + Sync {
    async fn update_claim(&self, snapshot: &VolumeClaimSnapshot, plan: &ResizePlan) -> Result<()>;
}

/// Why a cycle stopped before processing every claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    DeadlineExceeded,
    Cancelled,
}

/// Cooperative stop signal checked between claims
#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl CycleGuard {
    /// A guard that never fires
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop once the channel carries `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Returns the reason to stop, if any
    pub fn check(&self) -> Option<AbortReason> {
        if let Some(cancel) = &self.cancel {
            if *cancel.borrow() {
                return Some(AbortReason::Cancelled);
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(AbortReason::DeadlineExceeded),
            _ => None,
        }
    }
}
