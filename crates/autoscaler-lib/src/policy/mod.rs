//! Autoscaling policy attached to a claim
//!
//! The policy travels as string annotations on the claim. This module turns
//! them into a typed [`AutoscalePolicy`] in one validating pass, so decision
//! logic never looks at raw strings.

mod amount;
mod parser;
pub mod quantity;

pub use amount::{Amount, DEFAULT_INCREASE_PERCENT, DEFAULT_THRESHOLD_PERCENT};
pub use parser::{AutoscalePolicy, PolicyDefaults};
pub use quantity::{format_quantity, parse_quantity, round_up_to_gib, QuantityError, GIB};

use thiserror::Error;

/// Recognized policy keys (without the controller annotation prefix)
pub mod keys {
    pub const THRESHOLD: &str = "threshold";
    pub const INCREASE: &str = "increase";
    pub const CEILING: &str = "ceiling";
    pub const PREVIOUS_CAPACITY: &str = "previous_capacity";
}

/// A malformed policy value. The claim is skipped, never guessed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{key} value {value:?} is not a valid quantity: {source}")]
    Quantity {
        key: &'static str,
        value: String,
        #[source]
        source: QuantityError,
    },

    #[error("{key} percentage {value:?} is not an integer")]
    PercentNotNumeric { key: &'static str, value: String },

    #[error("{key} percentage {value:?} must be between 1% and 100%")]
    PercentOutOfRange { key: &'static str, value: String },

    #[error("{key} value {value:?} must be greater than zero")]
    Zero { key: &'static str, value: String },

    #[error("{key} value {value:?} is not a decimal byte count")]
    Marker { key: &'static str, value: String },
}

impl PolicyError {
    /// Policy key holding the offending value
    pub fn key(&self) -> &'static str {
        match self {
            PolicyError::Quantity { key, .. }
            | PolicyError::PercentNotNumeric { key, .. }
            | PolicyError::PercentOutOfRange { key, .. }
            | PolicyError::Zero { key, .. }
            | PolicyError::Marker { key, .. } => key,
        }
    }

    /// The raw offending value
    pub fn value(&self) -> &str {
        match self {
            PolicyError::Quantity { value, .. }
            | PolicyError::PercentNotNumeric { value, .. }
            | PolicyError::PercentOutOfRange { value, .. }
            | PolicyError::Zero { value, .. }
            | PolicyError::Marker { value, .. } => value,
        }
    }
}
