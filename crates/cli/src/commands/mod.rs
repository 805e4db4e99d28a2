//! CLI command implementations

pub mod claims;
pub mod evaluate;
