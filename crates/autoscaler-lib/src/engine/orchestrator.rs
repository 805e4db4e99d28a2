//! Resize orchestrator: composes the gates into one decision per claim

use super::eligibility::{check_eligibility, Ineligibility};
use super::growth::{compute_growth, Growth, GrowthInput};
use super::guard::pending_marker;
use crate::models::{ClaimRecord, StorageClassCapability, VolumeClaimSnapshot};
use crate::policy::{AutoscalePolicy, PolicyDefaults, PolicyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why no resize was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    Ineligible { detail: Ineligibility },
    /// A previous resize has not shown up in the metrics yet
    Pending { marker_bytes: u64 },
    BelowThreshold { used_bytes: u64, threshold_bytes: u64 },
    AtCeiling { ceiling_bytes: u64 },
}

impl SkipReason {
    /// Stable reason code for logs and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::Ineligible { .. } => "ineligible",
            SkipReason::Pending { .. } => "pending",
            SkipReason::BelowThreshold { .. } => "below_threshold",
            SkipReason::AtCeiling { .. } => "at_ceiling",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ineligible { detail } => write!(f, "{}", detail),
            SkipReason::Pending { marker_bytes } => write!(
                f,
                "waiting for the resize from {} bytes to take effect",
                marker_bytes
            ),
            SkipReason::BelowThreshold {
                used_bytes,
                threshold_bytes,
            } => write!(
                f,
                "usage {} bytes is below threshold {} bytes",
                used_bytes, threshold_bytes
            ),
            SkipReason::AtCeiling { ceiling_bytes } => {
                write!(f, "storage ceiling {} bytes reached", ceiling_bytes)
            }
        }
    }
}

/// Desired state for a claim that should grow. Handed to the update boundary
/// as-is; the snapshot is never modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePlan {
    /// Allocated capacity before the resize
    pub current_bytes: u64,
    pub target_bytes: u64,
    /// Marker to persist: the observed capacity before the resize
    pub previous_capacity: u64,
    pub used_bytes: u64,
    pub threshold_bytes: u64,
    pub clamped_to_ceiling: bool,
}

/// Outcome of the decision pipeline for one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResizeDecision {
    #[serde(rename = "none")]
    NoAction { reason: SkipReason },
    Resize(ResizePlan),
}

impl ResizeDecision {
    pub fn reason_code(&self) -> &'static str {
        match self {
            ResizeDecision::NoAction { reason } => reason.code(),
            ResizeDecision::Resize(_) => "resize",
        }
    }

    pub fn plan(&self) -> Option<&ResizePlan> {
        match self {
            ResizeDecision::Resize(plan) => Some(plan),
            ResizeDecision::NoAction { .. } => None,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        ResizeDecision::NoAction { reason }
    }
}

/// Result of the metrics-free stages for one claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// Eligible; carries the parsed policy for the remaining stages
    Eligible(AutoscalePolicy),
    Skip(SkipReason),
}

/// Stateless decision engine: parse, eligibility, oscillation guard, growth
#[derive(Debug, Clone, Default)]
pub struct ResizeEngine {
    defaults: PolicyDefaults,
}

impl ResizeEngine {
    pub fn new(defaults: PolicyDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &PolicyDefaults {
        &self.defaults
    }

    /// Decide for one claim. A malformed policy fails before any other stage.
    pub fn decide(
        &self,
        snapshot: &VolumeClaimSnapshot,
        capability: Option<&StorageClassCapability>,
    ) -> Result<ResizeDecision, PolicyError> {
        let policy = AutoscalePolicy::from_annotations(&snapshot.annotations, &self.defaults)?;
        Ok(Self::decide_with_policy(snapshot, capability, &policy))
    }

    /// Policy parse and eligibility gate for a discovered claim.
    ///
    /// Runs before metrics are joined: a claim that cannot be resized is
    /// skipped whether or not it has usage samples.
    pub fn screen(
        &self,
        record: &ClaimRecord,
        capability: Option<&StorageClassCapability>,
    ) -> Result<Screening, PolicyError> {
        let policy = AutoscalePolicy::from_annotations(&record.annotations, &self.defaults)?;
        match check_eligibility(capability, &record.resizability, record.allocated_bytes) {
            Ok(_) => Ok(Screening::Eligible(policy)),
            Err(detail) => Ok(Screening::Skip(SkipReason::Ineligible { detail })),
        }
    }

    /// Run the gates against an already parsed policy
    pub fn decide_with_policy(
        snapshot: &VolumeClaimSnapshot,
        capability: Option<&StorageClassCapability>,
        policy: &AutoscalePolicy,
    ) -> ResizeDecision {
        let allocated_bytes = match check_eligibility(
            capability,
            &snapshot.resizability,
            snapshot.allocated_bytes,
        ) {
            Ok(bytes) => bytes,
            Err(detail) => return ResizeDecision::skip(SkipReason::Ineligible { detail }),
        };

        let observed_capacity_bytes = snapshot.metrics.capacity_bytes;
        if let Some(marker_bytes) = pending_marker(policy, observed_capacity_bytes) {
            return ResizeDecision::skip(SkipReason::Pending { marker_bytes });
        }

        let input = GrowthInput {
            allocated_bytes,
            observed_capacity_bytes,
            used_bytes: snapshot.metrics.used_bytes,
        };

        match compute_growth(input, policy) {
            Growth::BelowThreshold {
                used_bytes,
                threshold_bytes,
            } => ResizeDecision::skip(SkipReason::BelowThreshold {
                used_bytes,
                threshold_bytes,
            }),
            Growth::AtCeiling { ceiling_bytes } => {
                ResizeDecision::skip(SkipReason::AtCeiling { ceiling_bytes })
            }
            Growth::Grow {
                used_bytes,
                threshold_bytes,
                target_bytes,
                clamped,
                ..
            } => {
                debug_assert!(target_bytes > allocated_bytes);
                debug_assert!(policy.ceiling.map_or(true, |c| target_bytes <= c));

                ResizeDecision::Resize(ResizePlan {
                    current_bytes: allocated_bytes,
                    target_bytes,
                    previous_capacity: observed_capacity_bytes,
                    used_bytes,
                    threshold_bytes,
                    clamped_to_ceiling: clamped,
                })
            }
        }
    }
}
