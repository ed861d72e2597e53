//! Inference tier: prompt, providers, answer recovery and the cascade

pub mod cascade;
pub mod json_recovery;
pub mod prompt;
pub mod provider;

pub use cascade::{Attempt, AttemptResult, CascadeOutcome, InferenceCascade};
pub use json_recovery::{balanced_blocks, recover_answer, strip_code_fences, RecoveredAnswer};
pub use prompt::build_prompt;
pub use provider::{
    build_providers, ChatCompletions, GenerateContent, HttpInferenceProvider, InferenceProvider,
    ProviderSpec, ReasoningTier, WireFormat,
};
