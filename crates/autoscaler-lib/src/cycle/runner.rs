//! One reconciliation pass over every managed claim

use super::report::{ClaimOutcome, CycleReport};
use super::{ClaimSource, ClaimUpdater, CycleGuard, MetricsSource, StorageClassSource};
use crate::engine::{ResizeDecision, ResizeEngine, Screening, SkipReason};
use crate::error::{ClaimError, CycleFatalError, Dependency};
use crate::models::{ClaimId, ClaimRecord, StorageClassCapability, VolumeMetrics};
use crate::observability::{AutoscalerMetrics, StructuredLogger};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Runs cycles against the configured collaborators
pub struct CycleRunner {
    claims: Arc<dyn ClaimSource>,
    metrics_source: Arc<dyn MetricsSource>,
    storage_classes: Arc<dyn StorageClassSource>,
    updater: Arc<dyn ClaimUpdater>,
    engine: ResizeEngine,
    dry_run: bool,
    metrics: AutoscalerMetrics,
    logger: StructuredLogger,
}

impl CycleRunner {
    pub fn builder() -> CycleRunnerBuilder {
        CycleRunnerBuilder::new()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run one cycle.
    ///
    /// Discovery and the bulk metrics fetch are all-or-nothing. After that every
    /// claim is independent: its errors end up in the report and the loop moves on.
    pub async fn run_cycle(&self, guard: &CycleGuard) -> Result<CycleReport, CycleFatalError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let records = match self.claims.list_claims().await {
            Ok(records) => records,
            Err(e) => return Err(self.fatal(CycleFatalError::Discovery(format!("{:#}", e)))),
        };
        let metrics = match self.metrics_source.fetch_metrics(started_at).await {
            Ok(metrics) => metrics,
            Err(e) => return Err(self.fatal(CycleFatalError::Metrics(format!("{:#}", e)))),
        };

        debug!(
            claims = records.len(),
            samples = metrics.len(),
            "Starting reconciliation cycle"
        );

        let total = records.len();
        let mut report = CycleReport::started(started_at, total);
        let mut capabilities: HashMap<String, bool> = HashMap::new();

        for (index, record) in records.into_iter().enumerate() {
            if let Some(reason) = guard.check() {
                self.logger.log_abort(reason, total - index);
                report.aborted = Some(reason);
                break;
            }

            let id = record.id.clone();
            let outcome = match self.process_claim(record, &metrics, &mut capabilities).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.logger.log_failure(&id, &err);
                    self.metrics.inc_claim_failures(&err);
                    ClaimOutcome::Failed {
                        kind: err.kind(),
                        message: err.to_string(),
                    }
                }
            };
            report.push(id, outcome);
        }

        report.finished_at = Utc::now();
        self.metrics
            .observe_cycle(&report, timer.elapsed().as_secs_f64());
        self.logger.log_cycle(&report);

        Ok(report)
    }

    fn fatal(&self, err: CycleFatalError) -> CycleFatalError {
        self.metrics.inc_cycle_failures();
        self.logger.log_cycle_failure(&err);
        err
    }

    async fn process_claim(
        &self,
        record: ClaimRecord,
        metrics: &HashMap<ClaimId, VolumeMetrics>,
        capabilities: &mut HashMap<String, bool>,
    ) -> Result<ClaimOutcome, ClaimError> {
        let capability = match &record.storage_class {
            Some(name) => Some(self.capability(name, capabilities).await?),
            None => None,
        };

        let policy = match self.engine.screen(&record, capability.as_ref())? {
            Screening::Eligible(policy) => policy,
            Screening::Skip(reason) => return Ok(self.skipped(&record.id, reason)),
        };

        let volume_metrics = metrics.get(&record.id).copied().ok_or_else(|| {
            ClaimError::unavailable(Dependency::Metrics, "no usage samples for this claim")
        })?;

        let snapshot = record.into_snapshot(volume_metrics);
        let decision = ResizeEngine::decide_with_policy(&snapshot, capability.as_ref(), &policy);

        match decision {
            ResizeDecision::NoAction { reason } => Ok(self.skipped(&snapshot.id, reason)),
            ResizeDecision::Resize(plan) if self.dry_run => {
                self.logger.log_planned(&snapshot.id, &plan);
                Ok(ClaimOutcome::DryRun(plan))
            }
            ResizeDecision::Resize(plan) => {
                self.updater
                    .update_claim(&snapshot, &plan)
                    .await
                    .map_err(|e| ClaimError::Persistence(format!("{:#}", e)))?;
                self.logger.log_resize(&snapshot.id, &plan);
                self.metrics.inc_resizes();
                Ok(ClaimOutcome::Resized(plan))
            }
        }
    }

    fn skipped(&self, id: &ClaimId, reason: SkipReason) -> ClaimOutcome {
        self.logger.log_skip(id, &reason);
        self.metrics.inc_skips(&reason);
        ClaimOutcome::Skipped { reason }
    }

    /// Capability lookup, cached for the rest of the cycle once it succeeds
    async fn capability(
        &self,
        name: &str,
        cache: &mut HashMap<String, bool>,
    ) -> Result<StorageClassCapability, ClaimError> {
        if let Some(&allows_expansion) = cache.get(name) {
            return Ok(StorageClassCapability::new(name, allows_expansion));
        }

        let allows_expansion = self
            .storage_classes
            .allows_expansion(name)
            .await
            .map_err(|e| ClaimError::unavailable(Dependency::StorageClass, format!("{:#}", e)))?;
        cache.insert(name.to_string(), allows_expansion);

        Ok(StorageClassCapability::new(name, allows_expansion))
    }
}

/// Builder for [`CycleRunner`]
pub struct CycleRunnerBuilder {
    claims: Option<Arc<dyn ClaimSource>>,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    storage_classes: Option<Arc<dyn StorageClassSource>>,
    updater: Option<Arc<dyn ClaimUpdater>>,
    engine: ResizeEngine,
    dry_run: bool,
    instance: String,
}

impl CycleRunnerBuilder {
    pub fn new() -> Self {
        Self {
            claims: None,
            metrics_source: None,
            storage_classes: None,
            updater: None,
            engine: ResizeEngine::default(),
            dry_run: false,
            instance: "pvc-autoscaler".to_string(),
        }
    }

    pub fn claims(mut self, claims: Arc<dyn ClaimSource>) -> Self {
        self.claims = Some(claims);
        self
    }

    pub fn metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.metrics_source = Some(source);
        self
    }

    pub fn storage_classes(mut self, source: Arc<dyn StorageClassSource>) -> Self {
        self.storage_classes = Some(source);
        self
    }

    pub fn updater(mut self, updater: Arc<dyn ClaimUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn engine(mut self, engine: ResizeEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Compute and report decisions without writing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Instance name attached to every structured log event
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn build(self) -> Result<CycleRunner> {
        let claims = self
            .claims
            .ok_or_else(|| anyhow::anyhow!("Claim source is required"))?;
        let metrics_source = self
            .metrics_source
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;
        let storage_classes = self
            .storage_classes
            .ok_or_else(|| anyhow::anyhow!("Storage class source is required"))?;
        let updater = self
            .updater
            .ok_or_else(|| anyhow::anyhow!("Claim updater is required"))?;

        Ok(CycleRunner {
            claims,
            metrics_source,
            storage_classes,
            updater,
            engine: self.engine,
            dry_run: self.dry_run,
            metrics: AutoscalerMetrics::new(),
            logger: StructuredLogger::new(self.instance),
        })
    }
}

impl Default for CycleRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
