//! Core data models for the autoscaler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a volume claim (namespace + name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId {
    pub namespace: String,
    pub name: String,
}

impl ClaimId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Usage metrics observed for one claim's volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMetrics {
    pub used_bytes: u64,
    /// Filesystem size as reported by the kubelet
    pub capacity_bytes: u64,
}

/// Result of the external lifecycle predicate for a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Resizability {
    Resizable,
    /// Not resizable right now, with an explanation for the logs
    Blocked(String),
}

/// Whether a named storage class permits live expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassCapability {
    pub name: String,
    pub allows_expansion: bool,
}

impl StorageClassCapability {
    pub fn new(name: impl Into<String>, allows_expansion: bool) -> Self {
        Self {
            name: name.into(),
            allows_expansion,
        }
    }
}

/// A claim as returned by discovery, before metrics are joined in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub id: ClaimId,
    pub storage_class: Option<String>,
    /// Allocated capacity from the claim status, absent until provisioned
    pub allocated_bytes: Option<u64>,
    pub resizability: Resizability,
    /// Policy annotations with the controller prefix already stripped
    pub annotations: BTreeMap<String, String>,
    /// Object version used for optimistic concurrency on update
    pub resource_version: Option<String>,
}

impl ClaimRecord {
    /// Join the observed metrics into a snapshot for this cycle
    pub fn into_snapshot(self, metrics: VolumeMetrics) -> VolumeClaimSnapshot {
        VolumeClaimSnapshot {
            id: self.id,
            storage_class: self.storage_class,
            allocated_bytes: self.allocated_bytes,
            metrics,
            resizability: self.resizability,
            annotations: self.annotations,
            resource_version: self.resource_version,
        }
    }
}

/// Read-only view of one claim for a single reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeClaimSnapshot {
    pub id: ClaimId,
    pub storage_class: Option<String>,
    pub allocated_bytes: Option<u64>,
    pub metrics: VolumeMetrics,
    pub resizability: Resizability,
    pub annotations: BTreeMap<String, String>,
    pub resource_version: Option<String>,
}
