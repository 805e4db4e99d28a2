//! Observability infrastructure for the autoscaler
//!
//! Provides:
//! - Prometheus metrics (cycle latency, resizes, skips by reason, failures by kind)
//! - Structured JSON logging with tracing

use crate::cycle::{AbortReason, CycleReport};
use crate::engine::{ResizePlan, SkipReason};
use crate::error::{ClaimError, CycleFatalError};
use crate::models::ClaimId;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Histogram buckets for cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AutoscalerMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AutoscalerMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles: IntCounter,
    cycle_failures: IntCounter,
    claims_evaluated: IntGauge,
    resizes: IntCounter,
    skips: IntCounterVec,
    claim_failures: IntCounterVec,
}

impl AutoscalerMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "pvc_autoscaler_cycle_duration_seconds",
                "Time spent running one reconciliation cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles: register_int_counter!(
                "pvc_autoscaler_cycles_total",
                "Total number of completed reconciliation cycles"
            )
            .expect("Failed to register cycles_total"),

            cycle_failures: register_int_counter!(
                "pvc_autoscaler_cycle_failures_total",
                "Total number of cycles aborted by a fatal error"
            )
            .expect("Failed to register cycle_failures_total"),

            claims_evaluated: register_int_gauge!(
                "pvc_autoscaler_claims_evaluated",
                "Number of claims evaluated in the last cycle"
            )
            .expect("Failed to register claims_evaluated"),

            resizes: register_int_counter!(
                "pvc_autoscaler_resizes_total",
                "Total number of resize requests written"
            )
            .expect("Failed to register resizes_total"),

            skips: register_int_counter_vec!(
                "pvc_autoscaler_skips_total",
                "Total number of claims left unchanged, by reason",
                &["reason"]
            )
            .expect("Failed to register skips_total"),

            claim_failures: register_int_counter_vec!(
                "pvc_autoscaler_claim_failures_total",
                "Total number of per-claim failures, by kind",
                &["kind"]
            )
            .expect("Failed to register claim_failures_total"),
        }
    }
}

/// Autoscaler metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AutoscalerMetrics {
    _private: (),
}

impl Default for AutoscalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoscalerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AutoscalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AutoscalerMetricsInner {
        GLOBAL_METRICS.get_or_init(AutoscalerMetricsInner::new)
    }

    /// Record the outcome of a completed cycle
    pub fn observe_cycle(&self, report: &CycleReport, duration_secs: f64) {
        let inner = self.inner();
        inner.cycles.inc();
        inner.cycle_duration_seconds.observe(duration_secs);
        inner.claims_evaluated.set(report.claims.len() as i64);
    }

    pub fn inc_cycle_failures(&self) {
        self.inner().cycle_failures.inc();
    }

    pub fn inc_resizes(&self) {
        self.inner().resizes.inc();
    }

    pub fn inc_skips(&self, reason: &SkipReason) {
        self.inner().skips.with_label_values(&[reason.code()]).inc();
    }

    pub fn inc_claim_failures(&self, err: &ClaimError) {
        self.inner()
            .claim_failures
            .with_label_values(&[err.kind().as_str()])
            .inc();
    }
}

/// Structured logger for autoscaler events
///
/// Every per-claim event carries the claim identity so that skips are never silent.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a resize request that was written
    pub fn log_resize(&self, id: &ClaimId, plan: &ResizePlan) {
        info!(
            event = "claim_resized",
            instance = %self.instance,
            claim = %id,
            old_bytes = plan.current_bytes,
            new_bytes = plan.target_bytes,
            used_bytes = plan.used_bytes,
            threshold_bytes = plan.threshold_bytes,
            previous_capacity = plan.previous_capacity,
            clamped_to_ceiling = plan.clamped_to_ceiling,
            "Claim resized"
        );
    }

    /// Log a resize that was computed but not written (dry-run)
    pub fn log_planned(&self, id: &ClaimId, plan: &ResizePlan) {
        info!(
            event = "resize_planned",
            instance = %self.instance,
            claim = %id,
            old_bytes = plan.current_bytes,
            new_bytes = plan.target_bytes,
            clamped_to_ceiling = plan.clamped_to_ceiling,
            "Dry run, resize not applied"
        );
    }

    /// Log a claim that was left unchanged
    pub fn log_skip(&self, id: &ClaimId, reason: &SkipReason) {
        match reason {
            SkipReason::BelowThreshold { .. } => {
                debug!(
                    event = "claim_skipped",
                    instance = %self.instance,
                    claim = %id,
                    reason = reason.code(),
                    details = %reason,
                    "Claim skipped"
                );
            }
            SkipReason::Ineligible { .. } => {
                warn!(
                    event = "claim_skipped",
                    instance = %self.instance,
                    claim = %id,
                    reason = reason.code(),
                    details = %reason,
                    "Claim skipped"
                );
            }
            _ => {
                info!(
                    event = "claim_skipped",
                    instance = %self.instance,
                    claim = %id,
                    reason = reason.code(),
                    details = %reason,
                    "Claim skipped"
                );
            }
        }
    }

    /// Log a per-claim failure
    pub fn log_failure(&self, id: &ClaimId, err: &ClaimError) {
        match err {
            ClaimError::Validation(policy_err) => {
                error!(
                    event = "claim_failed",
                    instance = %self.instance,
                    claim = %id,
                    kind = err.kind().as_str(),
                    key = policy_err.key(),
                    value = %policy_err.value(),
                    error = %err,
                    "Invalid autoscaling policy"
                );
            }
            _ => {
                error!(
                    event = "claim_failed",
                    instance = %self.instance,
                    claim = %id,
                    kind = err.kind().as_str(),
                    error = %err,
                    "Claim processing failed"
                );
            }
        }
    }

    /// Log a completed cycle
    pub fn log_cycle(&self, report: &CycleReport) {
        info!(
            event = "cycle_completed",
            instance = %self.instance,
            discovered = report.discovered,
            resized = report.resized(),
            skipped = report.skipped(),
            failed = report.failed(),
            aborted = ?report.aborted,
            "Reconciliation cycle complete"
        );
    }

    /// Log a cycle that stopped early
    pub fn log_abort(&self, reason: AbortReason, remaining: usize) {
        warn!(
            event = "cycle_aborted",
            instance = %self.instance,
            reason = ?reason,
            remaining = remaining,
            "Stopping cycle before all claims were processed"
        );
    }

    /// Log a cycle aborted by a fatal error
    pub fn log_cycle_failure(&self, err: &CycleFatalError) {
        error!(
            event = "cycle_failed",
            instance = %self.instance,
            error = %err,
            "Reconciliation cycle failed, retrying next interval"
        );
    }

    /// Log controller startup
    pub fn log_startup(&self, version: &str, dry_run: bool) {
        info!(
            event = "autoscaler_started",
            instance = %self.instance,
            version = %version,
            dry_run = dry_run,
            "PVC autoscaler started"
        );
    }

    /// Log controller shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "autoscaler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "PVC autoscaler shutting down"
        );
    }
}
