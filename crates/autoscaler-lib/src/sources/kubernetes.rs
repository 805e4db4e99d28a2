//! Kubernetes adapter
//!
//! Claims opt in with `<prefix>enabled: "true"`. Their policy annotations are
//! handed to the engine with the prefix stripped.

use crate::cycle::{async_trait, ClaimSource, ClaimUpdater, StorageClassSource};
use crate::engine::ResizePlan;
use crate::models::{ClaimId, ClaimRecord, Resizability, VolumeClaimSnapshot};
use crate::policy::{format_quantity, keys, parse_quantity};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_ANNOTATION_PREFIX: &str = "pvc-autoscaler.io/";

/// Opt-in annotation key, without prefix
pub const ENABLED_KEY: &str = "enabled";

const STORAGE_RESOURCE: &str = "storage";

/// Conditions that mean a resize is already in flight
const RESIZE_CONDITIONS: [&str; 2] = ["Resizing", "FileSystemResizePending"];

/// Claims, storage classes and resize writes through the Kubernetes API
#[derive(Clone)]
pub struct KubernetesClaims {
    client: Client,
    prefix: String,
    namespace: Option<String>,
}

impl KubernetesClaims {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            namespace: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Restrict discovery to one namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    fn claims_api(&self) -> Api<PersistentVolumeClaim> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ClaimSource for KubernetesClaims {
    async fn list_claims(&self) -> Result<Vec<ClaimRecord>> {
        let list = self
            .claims_api()
            .list(&ListParams::default())
            .await
            .context("Failed to list persistent volume claims")?;

        let enabled_key = format!("{}{}", self.prefix, ENABLED_KEY);
        let records: Vec<ClaimRecord> = list
            .items
            .iter()
            .filter(|pvc| is_enabled(pvc, &enabled_key))
            .map(|pvc| to_record(pvc, &self.prefix))
            .collect();

        debug!(
            total = list.items.len(),
            managed = records.len(),
            "Discovered persistent volume claims"
        );
        Ok(records)
    }
}

#[async_trait]
impl StorageClassSource for KubernetesClaims {
    async fn allows_expansion(&self, storage_class: &str) -> Result<bool> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let class = api
            .get(storage_class)
            .await
            .with_context(|| format!("Failed to get storage class {}", storage_class))?;

        Ok(class.allow_volume_expansion.unwrap_or(false))
    }
}

#[async_trait]
impl ClaimUpdater for KubernetesClaims {
    async fn update_claim(&self, snapshot: &VolumeClaimSnapshot, plan: &ResizePlan) -> Result<()> {
        let api: Api<PersistentVolumeClaim> =
            Api::namespaced(self.client.clone(), &snapshot.id.namespace);
        let patch = resize_patch(&self.prefix, snapshot, plan);

        api.patch(
            &snapshot.id.name,
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .with_context(|| format!("Failed to patch claim {}", snapshot.id))?;

        Ok(())
    }
}

fn is_enabled(pvc: &PersistentVolumeClaim, enabled_key: &str) -> bool {
    pvc.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(enabled_key))
        .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
}

/// Convert a claim object into the record the cycle runner works with
pub fn to_record(pvc: &PersistentVolumeClaim, prefix: &str) -> ClaimRecord {
    let id = ClaimId::new(
        pvc.metadata.namespace.clone().unwrap_or_default(),
        pvc.metadata.name.clone().unwrap_or_default(),
    );

    let annotations: BTreeMap<String, String> = pvc
        .metadata
        .annotations
        .iter()
        .flatten()
        .filter_map(|(k, v)| {
            k.strip_prefix(prefix)
                .map(|key| (key.to_string(), v.clone()))
        })
        .collect();

    let allocated_bytes = pvc
        .status
        .as_ref()
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get(STORAGE_RESOURCE))
        .and_then(|q| match parse_quantity(&q.0) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(claim = %id, quantity = %q.0, error = %e, "Unreadable status capacity");
                None
            }
        });

    ClaimRecord {
        storage_class: pvc
            .spec
            .as_ref()
            .and_then(|s| s.storage_class_name.clone())
            .filter(|s| !s.is_empty()),
        allocated_bytes,
        resizability: claim_resizability(pvc),
        annotations,
        resource_version: pvc.metadata.resource_version.clone(),
        id,
    }
}

/// Lifecycle predicate: whether the claim may be resized right now
pub fn claim_resizability(pvc: &PersistentVolumeClaim) -> Resizability {
    if pvc.metadata.deletion_timestamp.is_some() {
        return Resizability::Blocked("claim is terminating".to_string());
    }

    let status = pvc.status.as_ref();
    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("Pending");
    if phase != "Bound" {
        return Resizability::Blocked(format!("claim phase is {}", phase));
    }

    let volume_mode = pvc
        .spec
        .as_ref()
        .and_then(|s| s.volume_mode.as_deref())
        .unwrap_or("Filesystem");
    if volume_mode != "Filesystem" {
        return Resizability::Blocked(format!("volume mode {} is not supported", volume_mode));
    }

    let in_flight = status
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .find(|c| RESIZE_CONDITIONS.contains(&c.type_.as_str()) && c.status == "True");
    if let Some(condition) = in_flight {
        return Resizability::Blocked(format!("{} in progress", condition.type_));
    }

    Resizability::Resizable
}

/// Merge patch that requests the new size and records the marker.
///
/// Carries the listed resource version, so the write fails if the claim
/// changed since discovery.
pub fn resize_patch(
    prefix: &str,
    snapshot: &VolumeClaimSnapshot,
    plan: &ResizePlan,
) -> serde_json::Value {
    let mut metadata = json!({
        "annotations": {
            format!("{}{}", prefix, keys::PREVIOUS_CAPACITY): plan.previous_capacity.to_string(),
        }
    });
    if let Some(version) = &snapshot.resource_version {
        metadata["resourceVersion"] = json!(version);
    }

    json!({
        "metadata": metadata,
        "spec": {
            "resources": {
                "requests": {
                    STORAGE_RESOURCE: format_quantity(plan.target_bytes),
                }
            }
        }
    })
}
