//! Per-subject resolution workflow

pub mod orchestrator;

pub use orchestrator::{
    CompletionCallback, Lookup, ResolutionState, Resolver, ResolverBuilder, Tier,
};
