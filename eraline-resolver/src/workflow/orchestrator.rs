//! Resolution orchestrator
//!
//! # State progression (per subject)
//! UNRESOLVED → PENDING → RESOLVING(cache → pattern → reference → inference) → RESOLVED
//!
//! Tiers run strictly in order and the first usable result (a concrete year
//! or a sentinel label) stops the pipeline. Every completed resolution is
//! written to the store, including `UNKNOWN`; entries graded below `High`
//! are dropped and re-resolved on their next lookup.
//!
//! Cancellation is best-effort: `untrack` lets in-flight calls finish but
//! their result is discarded instead of being cached or reported.

use crate::cache::AttributionStore;
use crate::error::{ResolverError, Result};
use crate::extractors::PatternExtractor;
use crate::inference::{AttemptResult, CascadeOutcome, InferenceCascade, InferenceProvider};
use crate::models::{
    AttributionEntry, AttributionSource, Period, PeriodLabel, Reliability, SubjectMetadata,
    UserOverride,
};
use crate::services::{ReferenceLookup, ReferenceOutcome};
use crate::validators::{ReliabilityPolicy, ResolutionOutcome};
use chrono::{DateTime, Utc};
use eraline_common::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resolution tiers in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Cache,
    Pattern,
    ReferenceLookup,
    Inference,
}

impl Tier {
    pub fn name(self) -> &'static str {
        match self {
            Tier::Cache => "cache",
            Tier::Pattern => "pattern",
            Tier::ReferenceLookup => "reference_lookup",
            Tier::Inference => "inference",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Pending,
    Resolving(Tier),
    /// `is_final` false means the entry will be retried on its next lookup
    Resolved { is_final: bool },
}

/// Called once with the final entry of a background resolution
pub type CompletionCallback = Box<dyn FnOnce(AttributionEntry) + Send + 'static>;

/// Answer to `request`
pub enum Lookup {
    /// Final cached entry
    Ready(AttributionEntry),
    /// Resolution continues in the background
    Pending {
        placeholder: AttributionEntry,
        /// Yields `None` when the result was discarded by `untrack`
        handle: JoinHandle<Option<AttributionEntry>>,
    },
}

struct ResolverInner {
    store: Arc<AttributionStore>,
    extractor: PatternExtractor,
    reference: Option<Arc<dyn ReferenceLookup>>,
    reference_timeout: Duration,
    cascade: InferenceCascade,
    policy: ReliabilityPolicy,
    tracked: RwLock<HashMap<String, CancellationToken>>,
    states: RwLock<HashMap<String, ResolutionState>>,
}

/// Temporal attribution resolver
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

pub struct ResolverBuilder {
    store: Arc<AttributionStore>,
    reference: Option<Arc<dyn ReferenceLookup>>,
    providers: Vec<Arc<dyn InferenceProvider>>,
    provider_timeout: Duration,
    reference_timeout: Duration,
    policy: ReliabilityPolicy,
}

impl ResolverBuilder {
    pub fn with_reference(mut self, reference: Arc<dyn ReferenceLookup>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn InferenceProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Bound on each inference provider call
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Bound on one whole reference lookup
    pub fn with_reference_timeout(mut self, timeout: Duration) -> Self {
        self.reference_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: ReliabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Resolver {
        let cascade = InferenceCascade::new(self.providers, self.provider_timeout);
        info!(providers = ?cascade.provider_names(), reference = self.reference.is_some(), "Resolver ready");

        Resolver {
            inner: Arc::new(ResolverInner {
                store: self.store,
                extractor: PatternExtractor::new(),
                reference: self.reference,
                reference_timeout: self.reference_timeout,
                cascade,
                policy: self.policy,
                tracked: RwLock::new(HashMap::new()),
                states: RwLock::new(HashMap::new()),
            }),
        }
    }
}

/// Grading input plus provenance notes for one pipeline run
struct TierResult {
    outcome: ResolutionOutcome,
    notes: Option<String>,
}

impl Resolver {
    pub fn builder(store: Arc<AttributionStore>) -> ResolverBuilder {
        let timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        ResolverBuilder {
            store,
            reference: None,
            providers: Vec::new(),
            provider_timeout: timeout,
            reference_timeout: timeout,
            policy: ReliabilityPolicy::default(),
        }
    }

    pub fn store(&self) -> &Arc<AttributionStore> {
        &self.inner.store
    }

    pub async fn state(&self, subject_id: &str) -> ResolutionState {
        self.inner
            .states
            .read()
            .await
            .get(subject_id)
            .copied()
            .unwrap_or(ResolutionState::Unresolved)
    }

    pub async fn is_tracked(&self, subject_id: &str) -> bool {
        self.inner.tracked.read().await.contains_key(subject_id)
    }

    /// Batch-load durable entries ahead of a burst of requests
    pub async fn prefetch(&self, subject_ids: &[String]) -> usize {
        self.inner.store.prefetch(subject_ids).await
    }

    /// Resolve and wait for the final entry
    pub async fn resolve(&self, subject: &SubjectMetadata) -> AttributionEntry {
        let cached = match self.cached(subject).await {
            Ok(entry) => return entry,
            Err(stale) => stale,
        };
        let token = self.track(&subject.subject_id).await;
        match self.run_and_store(subject, cached, &token).await {
            Some(entry) => entry,
            // Untracked mid-flight: report without caching
            None => AttributionEntry::from_period(
                subject,
                Period::unknown(),
                Reliability::Low,
                AttributionSource::Unresolved,
                None,
            ),
        }
    }

    /// Non-blocking lookup
    ///
    /// A final cached entry is returned as `Ready`. Otherwise a placeholder is
    /// returned immediately and the tiers run in a background task that calls
    /// `on_complete` with the final entry (unless the subject is untracked first).
    pub async fn request(
        &self,
        subject: SubjectMetadata,
        on_complete: Option<CompletionCallback>,
    ) -> Lookup {
        let stale = match self.cached(&subject).await {
            Ok(entry) => return Lookup::Ready(entry),
            Err(stale) => stale,
        };

        let placeholder = AttributionEntry::pending(&subject);
        self.set_state(&subject.subject_id, ResolutionState::Pending).await;
        let token = self.track(&subject.subject_id).await;

        let resolver = self.clone();
        let handle = tokio::spawn(async move {
            let entry = resolver.run_and_store(&subject, stale, &token).await?;
            if let Some(callback) = on_complete {
                callback(entry.clone());
            }
            Some(entry)
        });

        Lookup::Pending {
            placeholder,
            handle,
        }
    }

    /// Stop tracking a subject; an in-flight result is discarded
    pub async fn untrack(&self, subject_id: &str) {
        if let Some(token) = self.inner.tracked.write().await.remove(subject_id) {
            token.cancel();
            debug!(subject_id, "Untracked subject, in-flight result will be discarded");
        }
        self.inner.states.write().await.remove(subject_id);
    }

    /// Write a user-supplied period as `Verified`, bypassing every tier
    pub async fn apply_override(&self, overriding: UserOverride) -> Result<AttributionEntry> {
        let invalid = |message: &str| {
            ResolverError::Common(eraline_common::Error::InvalidInput(message.to_string()))
        };
        let period = match overriding.start_year {
            Some(start) => {
                if overriding.end_year.is_some_and(|end| end < start) {
                    return Err(invalid("override end year precedes its start year"));
                }
                let period = Period::years(start, overriding.end_year, Vec::new());
                if let Some(label) = overriding.period_label.as_deref() {
                    if label.trim() != period.label.as_str() {
                        return Err(invalid("override label conflicts with its years"));
                    }
                }
                period
            }
            None => {
                if overriding.end_year.is_some() {
                    return Err(invalid("override end year requires a start year"));
                }
                let label = overriding
                    .period_label
                    .as_deref()
                    .map(PeriodLabel::parse)
                    .filter(PeriodLabel::is_sentinel)
                    .ok_or_else(|| invalid("override needs a start year or a sentinel label"))?;
                Period::sentinel(label)
            }
        };

        // A running resolution must not overwrite the override
        self.untrack(&overriding.subject_id).await;

        let existing = self.inner.store.get(&overriding.subject_id).await;
        let subject = match &existing {
            Some(entry) => SubjectMetadata {
                subject_id: entry.subject_id.clone(),
                title: entry.canonical_title.clone(),
                original_title: entry.original_title.clone(),
                ..SubjectMetadata::default()
            },
            None => SubjectMetadata::new(&overriding.subject_id, &overriding.subject_id),
        };

        let outcome = ResolutionOutcome {
            period,
            source: AttributionSource::UserSupplied,
            confidence: None,
            last_call_failed: false,
            reference: None,
        };
        let (reliability, _) = self.inner.policy.grade(&outcome, &subject.genres);
        let mut entry = AttributionEntry::from_period(
            &subject,
            outcome.period,
            reliability,
            AttributionSource::UserSupplied,
            Some("user override".to_string()),
        );
        if let Some(previous) = existing {
            entry.created_at = previous.created_at;
        }
        entry
            .validate()
            .map_err(|e| ResolverError::Common(eraline_common::Error::InvalidInput(e)))?;

        info!(subject_id = %entry.subject_id, label = %entry.period_label.as_str(), "Applied user override");
        self.inner.store.put(entry.clone()).await;
        self.set_state(&entry.subject_id, ResolutionState::Resolved { is_final: true }).await;
        Ok(entry)
    }

    /// `Ok(final entry)`, or `Err(created_at of a dropped stale entry)`
    async fn cached(&self, subject: &SubjectMetadata) -> std::result::Result<AttributionEntry, Option<DateTime<Utc>>> {
        let subject_id = subject.subject_id.as_str();
        self.set_state(subject_id, ResolutionState::Resolving(Tier::Cache)).await;

        match self.inner.store.get(subject_id).await {
            Some(entry) if entry.is_final() => {
                debug!(subject_id, reliability = %entry.reliability, "Cache hit");
                self.set_state(subject_id, ResolutionState::Resolved { is_final: true }).await;
                Ok(entry)
            }
            Some(entry) => {
                info!(subject_id, reliability = %entry.reliability, "Cached entry not final, re-resolving");
                self.inner.store.invalidate(subject_id).await;
                Err(Some(entry.created_at))
            }
            None => Err(None),
        }
    }

    async fn track(&self, subject_id: &str) -> CancellationToken {
        let mut tracked = self.inner.tracked.write().await;
        match tracked.get(subject_id) {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                let token = CancellationToken::new();
                tracked.insert(subject_id.to_string(), token.clone());
                token
            }
        }
    }

    async fn set_state(&self, subject_id: &str, state: ResolutionState) {
        self.inner
            .states
            .write()
            .await
            .insert(subject_id.to_string(), state);
    }

    /// Run the tiers, grade, store; `None` when the subject was untracked meanwhile
    async fn run_and_store(
        &self,
        subject: &SubjectMetadata,
        created_at: Option<DateTime<Utc>>,
        token: &CancellationToken,
    ) -> Option<AttributionEntry> {
        let subject_id = subject.subject_id.as_str();
        let result = self.run_tiers(subject, token).await;

        if token.is_cancelled() {
            info!(subject_id, "Discarding result for untracked subject");
            if !self.is_tracked(subject_id).await {
                self.inner.states.write().await.remove(subject_id);
            }
            return None;
        }

        let (reliability, rule) = self.inner.policy.grade(&result.outcome, &subject.genres);
        let mut entry = AttributionEntry::from_period(
            subject,
            result.outcome.period,
            reliability,
            result.outcome.source,
            result.notes,
        );
        if let Some(created_at) = created_at {
            entry.created_at = created_at;
        }

        info!(
            subject_id,
            label = %entry.period_label.as_str(),
            source = %entry.source.tag(),
            reliability = %entry.reliability,
            rule,
            "Resolved subject"
        );

        self.inner.store.put(entry.clone()).await;
        self.set_state(subject_id, ResolutionState::Resolved { is_final: entry.is_final() }).await;
        self.inner.tracked.write().await.remove(subject_id);
        Some(entry)
    }

    async fn run_tiers(&self, subject: &SubjectMetadata, token: &CancellationToken) -> TierResult {
        let subject_id = subject.subject_id.as_str();

        self.set_state(subject_id, ResolutionState::Resolving(Tier::Pattern)).await;
        if let Some(extraction) = self.inner.extractor.extract(subject) {
            debug!(subject_id, tier = Tier::Pattern.name(), detail = %extraction.detail, "Tier matched");
            return TierResult {
                outcome: ResolutionOutcome::resolved(
                    extraction.period,
                    extraction.source,
                    extraction.confidence,
                ),
                notes: Some(extraction.detail),
            };
        }

        let mut reference_source = None;
        if let Some(reference) = &self.inner.reference {
            if token.is_cancelled() {
                return TierResult::abandoned();
            }
            self.set_state(subject_id, ResolutionState::Resolving(Tier::ReferenceLookup)).await;

            let outcome = tokio::time::timeout(self.inner.reference_timeout, reference.lookup(subject))
                .await
                .unwrap_or_else(|_| ReferenceOutcome::Failed("timed out".to_string()));

            match outcome {
                ReferenceOutcome::Found(found) => {
                    debug!(subject_id, tier = Tier::ReferenceLookup.name(), article = %found.article, "Tier matched");
                    return TierResult {
                        outcome: ResolutionOutcome::resolved(
                            found.period,
                            AttributionSource::Reference,
                            found.confidence,
                        ),
                        notes: Some(format!("{}: {}", found.article, found.detail)),
                    };
                }
                ReferenceOutcome::NotFound => {
                    reference_source = Some(AttributionSource::ReferenceNotFound);
                }
                ReferenceOutcome::NoPeriod => {
                    reference_source = Some(AttributionSource::ReferenceNoPeriod);
                }
                ReferenceOutcome::Failed(message) => {
                    warn!(subject_id, error = %message, "Reference lookup failed");
                    reference_source = Some(AttributionSource::ReferenceError);
                }
            }
        }

        if token.is_cancelled() {
            return TierResult::abandoned();
        }
        self.set_state(subject_id, ResolutionState::Resolving(Tier::Inference)).await;

        match self.inner.cascade.run(subject, token).await {
            CascadeOutcome::Resolved {
                provider, answer, ..
            } => TierResult {
                notes: Some(format!("inferred by {}", provider)),
                outcome: ResolutionOutcome::resolved(
                    answer.period,
                    AttributionSource::Inference(provider),
                    answer.confidence,
                ),
            },
            CascadeOutcome::Exhausted { attempts } => {
                let last = attempts.last();
                let source = last
                    .map(|a| a.source())
                    .or_else(|| reference_source.clone())
                    .unwrap_or(AttributionSource::Unresolved);
                let confidence = match last.map(|a| &a.result) {
                    Some(AttemptResult::NoAnswer(confidence)) => Some(*confidence),
                    _ => None,
                };
                let notes = (!attempts.is_empty()).then(|| {
                    attempts
                        .iter()
                        .map(|a| a.source().tag())
                        .collect::<Vec<_>>()
                        .join(", ")
                });

                TierResult {
                    outcome: ResolutionOutcome {
                        period: Period::unknown(),
                        source,
                        confidence,
                        // No provider ran at all: nothing answered, keep it retryable
                        last_call_failed: last.map(|a| a.is_failure()).unwrap_or(true),
                        reference: reference_source,
                    },
                    notes,
                }
            }
        }
    }
}

impl TierResult {
    fn abandoned() -> Self {
        Self {
            outcome: ResolutionOutcome {
                period: Period::unknown(),
                source: AttributionSource::Unresolved,
                confidence: None,
                last_call_failed: false,
                reference: None,
            },
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;

    fn resolver() -> Resolver {
        Resolver::builder(Arc::new(AttributionStore::new(13, None))).build()
    }

    #[tokio::test]
    async fn test_pattern_hit_is_final_and_cached() {
        let resolver = resolver();
        let mut subject = SubjectMetadata::new("1", "Dunkirk");
        subject.synopsis = Some("1940年、ダンケルクの海岸".to_string());
        subject.genres = vec![Genre::War];

        let entry = resolver.resolve(&subject).await;
        assert_eq!(entry.start_year, Some(1940));
        assert_eq!(entry.reliability, Reliability::High);
        assert_eq!(entry.source, AttributionSource::Pattern);
        assert_eq!(
            resolver.state("1").await,
            ResolutionState::Resolved { is_final: true }
        );
        assert_eq!(resolver.store().get("1").await, Some(entry));
    }

    #[tokio::test]
    async fn test_nothing_configured_is_retryable() {
        let resolver = resolver();
        let subject = SubjectMetadata::new("2", "Untitled");

        let entry = resolver.resolve(&subject).await;
        assert_eq!(entry.period_label, PeriodLabel::Unknown);
        assert_eq!(entry.source, AttributionSource::Unresolved);
        assert_eq!(entry.reliability, Reliability::Low);
        assert!(resolver.store().ephemeral().get("2").await.is_some());
        assert_eq!(
            resolver.state("2").await,
            ResolutionState::Resolved { is_final: false }
        );
    }

    #[tokio::test]
    async fn test_override_requires_year_or_sentinel() {
        let resolver = resolver();
        let err = resolver
            .apply_override(UserOverride {
                subject_id: "3".to_string(),
                start_year: None,
                end_year: None,
                period_label: Some("sometime".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Common(_)));

        let entry = resolver
            .apply_override(UserOverride {
                subject_id: "3".to_string(),
                start_year: None,
                end_year: None,
                period_label: Some("NO_PERIOD".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(entry.reliability, Reliability::Verified);
        assert_eq!(entry.period_label, PeriodLabel::NoPeriod);
    }

    #[tokio::test]
    async fn test_override_rejects_inconsistent_input() {
        let resolver = resolver();
        let overriding = |start_year, end_year, label: Option<&str>| UserOverride {
            subject_id: "5".to_string(),
            start_year,
            end_year,
            period_label: label.map(str::to_string),
        };

        for bad in [
            overriding(Some(1945), Some(1939), None),
            overriding(Some(1939), None, Some("NO_PERIOD")),
            overriding(Some(1939), Some(1945), Some("1939")),
            overriding(None, Some(1945), Some("LONG_AGO")),
        ] {
            let err = resolver.apply_override(bad.clone()).await.unwrap_err();
            assert!(matches!(err, ResolverError::Common(_)), "{:?} was accepted", bad);
        }
        assert!(resolver.store().get("5").await.is_none());

        let entry = resolver
            .apply_override(overriding(Some(1939), Some(1945), Some("1939-1945")))
            .await
            .unwrap();
        assert_eq!(entry.period_label.as_str(), "1939-1945");
        assert_eq!(entry.end_year, Some(1945));
    }

    #[tokio::test]
    async fn test_request_returns_ready_for_final_entry() {
        let resolver = resolver();
        resolver
            .apply_override(UserOverride {
                subject_id: "4".to_string(),
                start_year: Some(1863),
                end_year: None,
                period_label: None,
            })
            .await
            .unwrap();

        match resolver.request(SubjectMetadata::new("4", "Glory"), None).await {
            Lookup::Ready(entry) => assert_eq!(entry.start_year, Some(1863)),
            Lookup::Pending { .. } => panic!("expected a cache hit"),
        }
    }
}
