//! Validating parse of claim annotations into an [`AutoscalePolicy`]

use super::amount::{Amount, DEFAULT_INCREASE_PERCENT, DEFAULT_THRESHOLD_PERCENT};
use super::quantity::parse_quantity;
use super::{keys, PolicyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Threshold and increase used when a claim does not annotate them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub threshold: Amount,
    pub increase: Amount,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            threshold: Amount::Percent(DEFAULT_THRESHOLD_PERCENT),
            increase: Amount::Percent(DEFAULT_INCREASE_PERCENT),
        }
    }
}

impl PolicyDefaults {
    /// Build defaults from configuration strings, validated like annotations
    pub fn parse(threshold: &str, increase: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            threshold: Amount::parse(keys::THRESHOLD, threshold)?,
            increase: Amount::parse(keys::INCREASE, increase)?,
        })
    }
}

/// Typed autoscaling policy for one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalePolicy {
    pub threshold: Amount,
    pub increase: Amount,
    /// Hard upper bound in bytes. `None` is unbounded: the controller will keep
    /// growing the claim for as long as the storage backend accepts it.
    pub ceiling: Option<u64>,
    /// Observed capacity recorded when the last resize was requested
    pub previous_capacity: Option<u64>,
}

impl AutoscalePolicy {
    /// Parse the policy from prefix-stripped annotations
    pub fn from_annotations(
        annotations: &BTreeMap<String, String>,
        defaults: &PolicyDefaults,
    ) -> Result<Self, PolicyError> {
        let threshold = match non_empty(annotations, keys::THRESHOLD) {
            Some(raw) => Amount::parse(keys::THRESHOLD, raw)?,
            None => defaults.threshold,
        };

        let increase = match non_empty(annotations, keys::INCREASE) {
            Some(raw) => Amount::parse(keys::INCREASE, raw)?,
            None => defaults.increase,
        };

        let ceiling = non_empty(annotations, keys::CEILING)
            .map(parse_ceiling)
            .transpose()?;

        let previous_capacity = annotations
            .get(keys::PREVIOUS_CAPACITY)
            .map(|raw| parse_marker(raw))
            .transpose()?;

        Ok(Self {
            threshold,
            increase,
            ceiling,
            previous_capacity,
        })
    }
}

fn non_empty<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(|value| value.as_str())
        .filter(|value| !value.trim().is_empty())
}

fn parse_ceiling(raw: &str) -> Result<u64, PolicyError> {
    let bytes = parse_quantity(raw).map_err(|source| PolicyError::Quantity {
        key: keys::CEILING,
        value: raw.to_string(),
        source,
    })?;

    if bytes == 0 {
        return Err(PolicyError::Zero {
            key: keys::CEILING,
            value: raw.to_string(),
        });
    }

    Ok(bytes)
}

fn parse_marker(raw: &str) -> Result<u64, PolicyError> {
    raw.trim().parse::<u64>().map_err(|_| PolicyError::Marker {
        key: keys::PREVIOUS_CAPACITY,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::quantity::GIB;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_absent() {
        let policy =
            AutoscalePolicy::from_annotations(&BTreeMap::new(), &PolicyDefaults::default())
                .unwrap();

        assert_eq!(policy.threshold, Amount::Percent(80));
        assert_eq!(policy.increase, Amount::Percent(20));
        assert_eq!(policy.ceiling, None);
        assert_eq!(policy.previous_capacity, None);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let policy = AutoscalePolicy::from_annotations(
            &annotations(&[("threshold", ""), ("increase", "  "), ("ceiling", "")]),
            &PolicyDefaults::default(),
        )
        .unwrap();

        assert_eq!(policy.threshold, Amount::Percent(80));
        assert_eq!(policy.increase, Amount::Percent(20));
        assert_eq!(policy.ceiling, None);
    }

    #[test]
    fn test_full_policy() {
        let policy = AutoscalePolicy::from_annotations(
            &annotations(&[
                ("threshold", "90%"),
                ("increase", "5Gi"),
                ("ceiling", "100Gi"),
                ("previous_capacity", "10737418240"),
            ]),
            &PolicyDefaults::default(),
        )
        .unwrap();

        assert_eq!(policy.threshold, Amount::Percent(90));
        assert_eq!(policy.increase, Amount::Bytes(5 * GIB));
        assert_eq!(policy.ceiling, Some(100 * GIB));
        assert_eq!(policy.previous_capacity, Some(10 * GIB));
    }

    #[test]
    fn test_configured_defaults() {
        let defaults = PolicyDefaults::parse("75%", "1Gi").unwrap();
        let policy = AutoscalePolicy::from_annotations(&BTreeMap::new(), &defaults).unwrap();

        assert_eq!(policy.threshold, Amount::Percent(75));
        assert_eq!(policy.increase, Amount::Bytes(GIB));
        assert!(PolicyDefaults::parse("0%", "20%").is_err());
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let defaults = PolicyDefaults::default();

        let err = AutoscalePolicy::from_annotations(&annotations(&[("threshold", "high")]), &defaults)
            .unwrap_err();
        assert_eq!(err.key(), "threshold");
        assert_eq!(err.value(), "high");

        let err = AutoscalePolicy::from_annotations(&annotations(&[("increase", "150%")]), &defaults)
            .unwrap_err();
        assert!(matches!(err, PolicyError::PercentOutOfRange { key: "increase", .. }));

        let err = AutoscalePolicy::from_annotations(&annotations(&[("ceiling", "0")]), &defaults)
            .unwrap_err();
        assert!(matches!(err, PolicyError::Zero { key: "ceiling", .. }));

        let err = AutoscalePolicy::from_annotations(
            &annotations(&[("previous_capacity", "10Gi")]),
            &defaults,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Marker { .. }));

        let err = AutoscalePolicy::from_annotations(
            &annotations(&[("previous_capacity", "")]),
            &defaults,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Marker { .. }));
    }

    #[test]
    fn test_unrelated_annotations_are_ignored() {
        let policy = AutoscalePolicy::from_annotations(
            &annotations(&[("enabled", "true"), ("owner", "team-a")]),
            &PolicyDefaults::default(),
        )
        .unwrap();

        assert_eq!(policy, AutoscalePolicy {
            threshold: Amount::Percent(80),
            increase: Amount::Percent(20),
            ceiling: None,
            previous_capacity: None,
        });
    }
}
