//! Resize decision engine
//!
//! Pure logic that turns a claim snapshot, its storage class capability and
//! its annotated policy into either "no action" or a concrete target capacity.
//! Stages run in a fixed order and each may short-circuit the rest:
//!
//! 1. policy parse (fails fast on malformed values)
//! 2. eligibility gate
//! 3. oscillation guard
//! 4. growth calculation

mod eligibility;
mod growth;
mod guard;
mod orchestrator;


pub use eligibility::{check_eligibility, Ineligibility};
pub use growth::{compute_growth, Growth, GrowthInput};
pub use guard::pending_marker;
pub use orchestrator::{ResizeDecision, ResizeEngine, ResizePlan, Screening, SkipReason};
