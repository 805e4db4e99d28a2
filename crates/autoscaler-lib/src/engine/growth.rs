//! Growth calculator
//!
//! ```text
//! threshold = resolve(policy.threshold, observed_capacity)
//! if used < threshold:           BelowThreshold
//! increase  = resolve(policy.increase, allocated)
//! target    = round_up_to_gib(allocated + increase)
//! if target > ceiling:           target = ceiling
//! if target <= allocated:        AtCeiling
//! else                           Grow(target)
//! ```

use crate::policy::{round_up_to_gib, AutoscalePolicy};

/// Capacities the calculator works from, all in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthInput {
    /// Capacity allocated to the claim (status)
    pub allocated_bytes: u64,
    /// Filesystem capacity reported by metrics
    pub observed_capacity_bytes: u64,
    pub used_bytes: u64,
}

/// Outcome of the growth calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    BelowThreshold {
        used_bytes: u64,
        threshold_bytes: u64,
    },
    /// Usage is above threshold but the ceiling leaves no room
    AtCeiling { ceiling_bytes: u64 },
    Grow {
        used_bytes: u64,
        threshold_bytes: u64,
        /// Target before the ceiling clamp, always GiB aligned
        rounded_bytes: u64,
        target_bytes: u64,
        clamped: bool,
    },
}

pub fn compute_growth(input: GrowthInput, policy: &AutoscalePolicy) -> Growth {
    let threshold_bytes = policy.threshold.resolve(input.observed_capacity_bytes);
    if input.used_bytes < threshold_bytes {
        return Growth::BelowThreshold {
            used_bytes: input.used_bytes,
            threshold_bytes,
        };
    }

    let increase_bytes = policy.increase.resolve(input.allocated_bytes);
    let rounded_bytes = round_up_to_gib(input.allocated_bytes.saturating_add(increase_bytes));

    let (target_bytes, clamped) = match policy.ceiling {
        Some(ceiling) if rounded_bytes > ceiling => (ceiling, true),
        _ => (rounded_bytes, false),
    };

    if target_bytes <= input.allocated_bytes {
        return Growth::AtCeiling {
            ceiling_bytes: target_bytes,
        };
    }

    Growth::Grow {
        used_bytes: input.used_bytes,
        threshold_bytes,
        rounded_bytes,
        target_bytes,
        clamped,
    }
}
