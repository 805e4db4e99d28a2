//! Eligibility gate: can this claim be resized at all this cycle?

use crate::models::{Resizability, StorageClassCapability};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a claim is not a resize candidate this cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ineligibility {
    /// The claim does not reference a storage class
    NoStorageClass,
    ExpansionNotAllowed { storage_class: String },
    /// The lifecycle predicate reported the claim as not resizable
    Blocked { reason: String },
    /// No allocated capacity yet. Transient, re-checked every cycle.
    NotProvisioned,
    ZeroCapacity,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::NoStorageClass => write!(f, "claim has no storage class"),
            Ineligibility::ExpansionNotAllowed { storage_class } => write!(
                f,
                "storage class {} does not allow volume expansion",
                storage_class
            ),
            Ineligibility::Blocked { reason } => write!(f, "claim is not resizable: {}", reason),
            Ineligibility::NotProvisioned => write!(f, "claim capacity is not set yet"),
            Ineligibility::ZeroCapacity => write!(f, "claim capacity is zero"),
        }
    }
}

/// Check the gates in order and return the allocated capacity on success.
///
/// Needs nothing from metrics, so it can run before they are joined in.
pub fn check_eligibility(
    capability: Option<&StorageClassCapability>,
    resizability: &Resizability,
    allocated_bytes: Option<u64>,
) -> Result<u64, Ineligibility> {
    let capability = capability.ok_or(Ineligibility::NoStorageClass)?;
    if !capability.allows_expansion {
        return Err(Ineligibility::ExpansionNotAllowed {
            storage_class: capability.name.clone(),
        });
    }

    if let Resizability::Blocked(reason) = resizability {
        return Err(Ineligibility::Blocked {
            reason: reason.clone(),
        });
    }

    match allocated_bytes {
        None => Err(Ineligibility::NotProvisioned),
        Some(0) => Err(Ineligibility::ZeroCapacity),
        Some(bytes) => Ok(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_claim_returns_allocated_capacity() {
        let capability = StorageClassCapability::new("standard", true);
        let result = check_eligibility(Some(&capability), &Resizability::Resizable, Some(100));
        assert_eq!(result, Ok(100));
    }

    #[test]
    fn test_storage_class_gates_come_first() {
        let fixed = StorageClassCapability::new("fixed", false);
        let blocked = Resizability::Blocked("terminating".to_string());

        assert_eq!(
            check_eligibility(None, &blocked, None),
            Err(Ineligibility::NoStorageClass)
        );
        assert_eq!(
            check_eligibility(Some(&fixed), &blocked, None),
            Err(Ineligibility::ExpansionNotAllowed {
                storage_class: "fixed".to_string()
            })
        );
    }

    #[test]
    fn test_blocked_before_capacity() {
        let capability = StorageClassCapability::new("standard", true);
        let result = check_eligibility(
            Some(&capability),
            &Resizability::Blocked("phase is Pending".to_string()),
            None,
        );
        assert_eq!(
            result,
            Err(Ineligibility::Blocked {
                reason: "phase is Pending".to_string()
            })
        );
    }

    #[test]
    fn test_capacity_must_be_observed() {
        let capability = StorageClassCapability::new("standard", true);
        assert_eq!(
            check_eligibility(Some(&capability), &Resizability::Resizable, None),
            Err(Ineligibility::NotProvisioned)
        );
        assert_eq!(
            check_eligibility(Some(&capability), &Resizability::Resizable, Some(0)),
            Err(Ineligibility::ZeroCapacity)
        );
    }
}
