//! Error types for reconciliation cycles

use crate::policy::PolicyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// External dependency a claim could not be evaluated without
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    StorageClass,
    Metrics,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::StorageClass => write!(f, "storage class"),
            Dependency::Metrics => write!(f, "volume metrics"),
        }
    }
}

/// Failure scoped to a single claim. The claim is skipped this cycle and
/// re-derived from fresh state on the next one.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("invalid autoscaling policy: {0}")]
    Validation(#[from] PolicyError),

    #[error("{dependency} unavailable: {message}")]
    DependencyUnavailable {
        dependency: Dependency,
        message: String,
    },

    #[error("failed to persist resize: {0}")]
    Persistence(String),
}

/// Coarse classification of a [`ClaimError`], used for labels and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimErrorKind {
    Validation,
    DependencyUnavailable,
    Persistence,
}

impl ClaimErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimErrorKind::Validation => "validation",
            ClaimErrorKind::DependencyUnavailable => "dependency_unavailable",
            ClaimErrorKind::Persistence => "persistence",
        }
    }
}

impl ClaimError {
    pub fn kind(&self) -> ClaimErrorKind {
        match self {
            ClaimError::Validation(_) => ClaimErrorKind::Validation,
            ClaimError::DependencyUnavailable { .. } => ClaimErrorKind::DependencyUnavailable,
            ClaimError::Persistence(_) => ClaimErrorKind::Persistence,
        }
    }

    pub(crate) fn unavailable(dependency: Dependency, message: impl Into<String>) -> Self {
        ClaimError::DependencyUnavailable {
            dependency,
            message: message.into(),
        }
    }
}

/// Failure that aborts a whole cycle before any claim is processed
#[derive(Debug, Error)]
pub enum CycleFatalError {
    #[error("failed to list volume claims: {0}")]
    Discovery(String),

    #[error("failed to fetch volume metrics: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_error_kinds() {
        let err = ClaimError::from(PolicyError::Zero {
            key: "ceiling",
            value: "0".to_string(),
        });
        assert_eq!(err.kind(), ClaimErrorKind::Validation);
        assert!(err.to_string().contains("ceiling"));

        let err = ClaimError::unavailable(Dependency::Metrics, "no samples");
        assert_eq!(err.kind(), ClaimErrorKind::DependencyUnavailable);
        assert_eq!(err.to_string(), "volume metrics unavailable: no samples");

        let err = ClaimError::Persistence("conflict".to_string());
        assert_eq!(err.kind().as_str(), "persistence");
    }
}
