//! Health check infrastructure for the autoscaler
//!
//! Tracks the health of the reconciler and its two external dependencies
//! (Kubernetes API and metrics source) for liveness and readiness probes.

use crate::cycle::CycleReport;
use crate::error::CycleFatalError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const RECONCILER: &str = "reconciler";
    pub const METRICS_SOURCE: &str = "metrics_source";
    pub const KUBERNETES_API: &str = "kubernetes_api";

    pub const ALL: [&str; 3] = [RECONCILER, METRICS_SOURCE, KUBERNETES_API];
}

/// Consecutive fatal cycles after which the reconciler is reported unhealthy
pub const UNHEALTHY_AFTER_FAILED_CYCLES: u32 = 3;

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    failed_cycles: Arc<RwLock<u32>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            failed_cycles: Arc::new(RwLock::new(0)),
        }
    }

    /// Registry with every autoscaler component registered as healthy
    pub async fn with_components() -> Self {
        let registry = Self::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Fold a cycle result into component health.
    ///
    /// A completed cycle marks everything healthy and the controller ready.
    /// A fatal error degrades the dependency that caused it and the reconciler;
    /// after [`UNHEALTHY_AFTER_FAILED_CYCLES`] in a row the reconciler is unhealthy.
    pub async fn record_cycle(&self, result: Result<&CycleReport, &CycleFatalError>) {
        let err = match result {
            Ok(_) => {
                *self.failed_cycles.write().await = 0;
                for name in components::ALL {
                    self.set_healthy(name).await;
                }
                self.set_ready(true).await;
                return;
            }
            Err(err) => err,
        };

        let dependency = match err {
            CycleFatalError::Discovery(_) => components::KUBERNETES_API,
            CycleFatalError::Metrics(_) => components::METRICS_SOURCE,
        };
        self.set_degraded(dependency, err.to_string()).await;

        let failed = {
            let mut failed_cycles = self.failed_cycles.write().await;
            *failed_cycles = failed_cycles.saturating_add(1);
            *failed_cycles
        };
        if failed >= UNHEALTHY_AFTER_FAILED_CYCLES {
            self.set_unhealthy(
                components::RECONCILER,
                format!("{} consecutive cycles failed", failed),
            )
            .await;
        } else {
            self.set_degraded(components::RECONCILER, "last cycle failed")
                .await;
        }
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("No reconciliation cycle completed yet".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_with_components_registers_all() {
        let registry = HealthRegistry::with_components().await;
        let health = registry.health().await;

        assert_eq!(health.components.len(), 3);
        assert_eq!(
            health.components[components::METRICS_SOURCE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_metrics_failure_degrades_metrics_source() {
        let registry = HealthRegistry::with_components().await;
        let err = CycleFatalError::Metrics("connection refused".to_string());

        registry.record_cycle(Err(&err)).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::METRICS_SOURCE].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::KUBERNETES_API].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_discovery_failure_degrades_kubernetes_api() {
        let registry = HealthRegistry::with_components().await;
        let err = CycleFatalError::Discovery("forbidden".to_string());

        registry.record_cycle(Err(&err)).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::KUBERNETES_API].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_completed_cycle_recovers_and_sets_ready() {
        let registry = HealthRegistry::with_components().await;
        let err = CycleFatalError::Metrics("timeout".to_string());
        registry.record_cycle(Err(&err)).await;
        assert!(!registry.readiness().await.ready);

        registry.record_cycle(Ok(&CycleReport::default())).await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_repeated_fatal_cycles_make_reconciler_unhealthy() {
        let registry = HealthRegistry::with_components().await;
        registry.record_cycle(Ok(&CycleReport::default())).await;
        let err = CycleFatalError::Metrics("connection refused".to_string());

        for _ in 1..UNHEALTHY_AFTER_FAILED_CYCLES {
            registry.record_cycle(Err(&err)).await;
        }
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.record_cycle(Err(&err)).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::RECONCILER].status,
            ComponentStatus::Unhealthy
        );
        assert!(!registry.readiness().await.ready);

        registry.record_cycle(Ok(&CycleReport::default())).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_failure_streak_resets_after_completed_cycle() {
        let registry = HealthRegistry::with_components().await;
        let err = CycleFatalError::Discovery("forbidden".to_string());

        for _ in 1..UNHEALTHY_AFTER_FAILED_CYCLES {
            registry.record_cycle(Err(&err)).await;
        }
        registry.record_cycle(Ok(&CycleReport::default())).await;
        registry.record_cycle(Err(&err)).await;

        assert_eq!(
            registry.health().await.components[components::RECONCILER].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::with_components().await;
        registry.set_ready(true).await;
        registry
            .set_unhealthy(components::RECONCILER, "Failed")
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }
}
