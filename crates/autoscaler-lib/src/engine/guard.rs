//! Oscillation guard
//!
//! The marker written with a resize is the observed capacity at that time.
//! While the observed capacity still equals it, the storage backend has not
//! honored the request yet and no further resize is issued. There is no
//! timeout: a claim whose metrics never change stays gated.

use crate::policy::AutoscalePolicy;

/// Returns the marker if a previous resize is still in flight
pub fn pending_marker(policy: &AutoscalePolicy, observed_capacity_bytes: u64) -> Option<u64> {
    policy
        .previous_capacity
        .filter(|marker| *marker == observed_capacity_bytes)
}
