//! Production collaborators for the cycle runner
//!
//! - [`KubernetesClaims`]: claim discovery, storage class lookups and the resize write
//! - [`PrometheusMetricsSource`]: kubelet volume statistics from the Prometheus query API

mod kubernetes;
mod prometheus;

pub use kubernetes::{
    claim_resizability, resize_patch, to_record, KubernetesClaims, DEFAULT_ANNOTATION_PREFIX,
    ENABLED_KEY,
};
pub use prometheus::{PrometheusMetricsSource, CAPACITY_QUERY, USED_QUERY};
