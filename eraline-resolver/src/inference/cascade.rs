//! Inference cascade
//!
//! Providers run one at a time in priority order. The first usable answer
//! (concrete start year or sentinel label) stops the cascade. Rate limiting,
//! errors, timeouts and unusable answers all advance to the next provider.
//! Each provider carries an hourly request budget; an exhausted budget is a
//! proactive rate-limit skip.

use super::json_recovery::{recover_answer, RecoveredAnswer};
use super::prompt::build_prompt;
use super::provider::InferenceProvider;
use crate::error::ResolverError;
use crate::models::{AttributionSource, Confidence, SubjectMetadata};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a single provider attempt ended without a usable answer
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    /// HTTP 429 or local budget exhausted
    RateLimited,
    /// Network, status, timeout or parse failure
    Failed(String),
    /// Well-formed answer with neither a year nor a sentinel
    NoAnswer(Confidence),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub provider: String,
    pub result: AttemptResult,
}

impl Attempt {
    /// Source tag recorded when this attempt is the last one
    pub fn source(&self) -> AttributionSource {
        match &self.result {
            AttemptResult::RateLimited => AttributionSource::InferenceRateLimited(self.provider.clone()),
            AttemptResult::Failed(_) => AttributionSource::InferenceError(self.provider.clone()),
            AttemptResult::NoAnswer(_) => AttributionSource::Inference(self.provider.clone()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.source().is_failure()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    Resolved {
        provider: String,
        answer: RecoveredAnswer,
        /// Earlier providers that were skipped or failed
        attempts: Vec<Attempt>,
    },
    Exhausted {
        attempts: Vec<Attempt>,
    },
}

struct CascadeSlot {
    provider: Arc<dyn InferenceProvider>,
    budget: Option<DefaultDirectRateLimiter>,
}

pub struct InferenceCascade {
    slots: Vec<CascadeSlot>,
    timeout: Duration,
}

impl InferenceCascade {
    /// Disabled providers are dropped; the rest are ordered by priority
    pub fn new(providers: Vec<Arc<dyn InferenceProvider>>, timeout: Duration) -> Self {
        let mut slots: Vec<CascadeSlot> = providers
            .into_iter()
            .filter(|p| p.spec().enabled)
            .map(|provider| {
                let budget = NonZeroU32::new(provider.spec().rate_limit_per_hour)
                    .map(|per_hour| RateLimiter::direct(Quota::per_hour(per_hour)));
                CascadeSlot { provider, budget }
            })
            .collect();
        slots.sort_by_key(|slot| slot.provider.spec().priority);

        Self { slots, timeout }
    }

    /// Names of participating providers, in run order
    pub fn provider_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.provider.spec().name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    async fn attempt(&self, slot: &CascadeSlot, prompt: &str) -> Result<RecoveredAnswer, AttemptResult> {
        let name = slot.provider.spec().name.as_str();

        if let Some(budget) = &slot.budget {
            if budget.check().is_err() {
                info!(provider = name, "Hourly budget exhausted, skipping provider");
                return Err(AttemptResult::RateLimited);
            }
        }

        let text = match tokio::time::timeout(self.timeout, slot.provider.complete(prompt)).await {
            Err(_) => {
                warn!(provider = name, timeout_secs = self.timeout.as_secs(), "Provider timed out");
                return Err(AttemptResult::Failed("timed out".to_string()));
            }
            Ok(Err(ResolverError::ProviderRateLimited { .. })) => {
                warn!(provider = name, "Provider rate limited");
                return Err(AttemptResult::RateLimited);
            }
            Ok(Err(e)) => {
                warn!(provider = name, error = %e, "Provider failed");
                return Err(AttemptResult::Failed(e.to_string()));
            }
            Ok(Ok(text)) => text,
        };

        let Some(answer) = recover_answer(&text) else {
            warn!(provider = name, "No structured answer in provider response");
            return Err(AttemptResult::Failed("unparseable response".to_string()));
        };

        if answer.period.is_usable() {
            Ok(answer)
        } else {
            debug!(provider = name, confidence = %answer.confidence.as_str(), "Provider gave no period");
            Err(AttemptResult::NoAnswer(answer.confidence))
        }
    }

    /// Run providers until one yields a usable answer
    ///
    /// Stops early (as `Exhausted`) once `cancel` fires.
    pub async fn run(&self, subject: &SubjectMetadata, cancel: &CancellationToken) -> CascadeOutcome {
        let prompt = build_prompt(subject);
        let mut attempts = Vec::new();

        for slot in &self.slots {
            if cancel.is_cancelled() {
                debug!(subject_id = %subject.subject_id, "Cascade cancelled");
                break;
            }

            let name = slot.provider.spec().name.clone();
            debug!(subject_id = %subject.subject_id, provider = %name, "Querying inference provider");

            match self.attempt(slot, &prompt).await {
                Ok(answer) => {
                    info!(
                        subject_id = %subject.subject_id,
                        provider = %name,
                        label = %answer.period.label.as_str(),
                        "Inference resolved period"
                    );
                    return CascadeOutcome::Resolved {
                        provider: name,
                        answer,
                        attempts,
                    };
                }
                Err(result) => attempts.push(Attempt {
                    provider: name,
                    result,
                }),
            }
        }

        info!(
            subject_id = %subject.subject_id,
            attempts = attempts.len(),
            "Inference cascade exhausted"
        );
        CascadeOutcome::Exhausted { attempts }
    }
}
