//! Library for the persistent volume claim autoscaler
//!
//! This crate provides the core functionality for:
//! - Parsing the autoscaling policy attached to a claim as annotations
//! - Deciding whether and by how much a claim should grow
//! - Running reconciliation cycles against Kubernetes and Prometheus
//! - Health checks, Prometheus metrics and the HTTP API

pub mod api;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod sources;

pub use engine::{ResizeDecision, ResizeEngine, ResizePlan, SkipReason};
pub use error::{ClaimError, CycleFatalError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AutoscalerMetrics, StructuredLogger};
pub use policy::{AutoscalePolicy, PolicyDefaults, PolicyError};
