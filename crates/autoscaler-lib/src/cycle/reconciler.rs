//! Periodic reconcile loop
//!
//! Runs one cycle per tick until shutdown, publishes the last report and
//! keeps the health registry in step with the cycle results.

use super::report::CycleReport;
use super::runner::CycleRunner;
use super::CycleGuard;
use crate::error::CycleFatalError;
use crate::health::HealthRegistry;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Last completed cycle, shared with the HTTP API
pub type SharedReport = Arc<RwLock<Option<CycleReport>>>;

/// Configuration for the reconcile loop
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Time between cycle starts (default: 60 seconds)
    pub interval: Duration,
    /// Per-cycle deadline; `None` lets a cycle run to completion
    pub cycle_timeout: Option<Duration>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cycle_timeout: Some(Duration::from_secs(50)),
        }
    }
}

pub struct Reconciler {
    runner: CycleRunner,
    health: HealthRegistry,
    last_report: SharedReport,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn builder(runner: CycleRunner) -> ReconcilerBuilder {
        ReconcilerBuilder::new(runner)
    }

    pub fn last_report(&self) -> SharedReport {
        self.last_report.clone()
    }

    /// Tick until the shutdown channel carries `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.cycle_timeout.map(|t| t.as_secs()),
            dry_run = self.runner.is_dry_run(),
            "Starting reconcile loop"
        );

        let cancel = shutdown.clone();
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are already logged and folded into health.
                    let _ = self.run_once(&cancel).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutting down reconcile loop");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single cycle now, honoring the configured timeout and `cancel`
    pub async fn run_once(
        &self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleFatalError> {
        let mut guard = CycleGuard::unbounded().with_cancel(cancel.clone());
        if let Some(timeout) = self.config.cycle_timeout {
            guard = guard.with_deadline(Instant::now() + timeout);
        }

        let result = self.runner.run_cycle(&guard).await;
        self.health.record_cycle(result.as_ref()).await;

        if let Ok(report) = &result {
            debug!(
                resized = report.resized(),
                skipped = report.skipped(),
                failed = report.failed(),
                "Publishing cycle report"
            );
            *self.last_report.write().await = Some(report.clone());
        }

        result
    }
}

/// Builder for [`Reconciler`]
pub struct ReconcilerBuilder {
    runner: CycleRunner,
    health: Option<HealthRegistry>,
    last_report: Option<SharedReport>,
    config: ReconcileConfig,
}

impl ReconcilerBuilder {
    pub fn new(runner: CycleRunner) -> Self {
        Self {
            runner,
            health: None,
            last_report: None,
            config: ReconcileConfig::default(),
        }
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn last_report(mut self, last_report: SharedReport) -> Self {
        self.last_report = Some(last_report);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Per-cycle deadline. A zero duration disables it.
    pub fn cycle_timeout(mut self, timeout: Duration) -> Self {
        self.config.cycle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn build(self) -> Result<Reconciler> {
        if self.config.interval.is_zero() {
            anyhow::bail!("Reconcile interval must be greater than zero");
        }

        Ok(Reconciler {
            runner: self.runner,
            health: self.health.unwrap_or_default(),
            last_report: self.last_report.unwrap_or_default(),
            config: self.config,
        })
    }
}
