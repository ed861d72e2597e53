//! Result grading

pub mod reliability;

pub use reliability::{Condition, PolicyRule, ReliabilityPolicy, ResolutionOutcome};
