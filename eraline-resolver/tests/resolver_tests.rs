//! Resolver behaviour across tiers
//!
//! Collaborators are call-counting fakes so tier ordering and caching can be
//! asserted directly.

mod helpers;

use eraline_resolver::inference::InferenceProvider;
use eraline_resolver::models::{
    AttributionEntry, AttributionSource, Genre, Period, PeriodLabel, Reliability, UserOverride,
};
use eraline_resolver::services::ReferenceOutcome;
use eraline_resolver::{Lookup, ResolutionState, Resolver};
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

const GOOD_ANSWER: &str =
    r#"{"startYear": 1944, "endYear": null, "additionalYears": null, "period": "1944年", "confidence": "high"}"#;

fn providers(list: &[Arc<FakeProvider>]) -> Vec<Arc<dyn InferenceProvider>> {
    list.iter()
        .map(|p| p.clone() as Arc<dyn InferenceProvider>)
        .collect()
}

#[tokio::test]
async fn test_final_entry_is_not_resolved_twice() {
    let reference = FakeReference::new(ReferenceOutcome::NotFound);
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(reference.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();
    let subject = opaque_subject("100");

    let first = resolver.resolve(&subject).await;
    assert_eq!(first.reliability, Reliability::High);
    assert_eq!(first.source, AttributionSource::Inference("deepseek".to_string()));

    let second = resolver.resolve(&subject).await;
    assert_eq!(second, first);
    assert_eq!(reference.calls(), 1);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_low_entry_is_dropped_and_re_resolved() {
    let store = ephemeral_store();
    let subject = opaque_subject("101");
    let stale = AttributionEntry::from_period(
        &subject,
        Period::unknown(),
        Reliability::Low,
        AttributionSource::InferenceRateLimited("gemini".to_string()),
        None,
    );
    store.put(stale.clone()).await;

    let reference = FakeReference::new(ReferenceOutcome::NoPeriod);
    let provider = FakeProvider::answering("gemini", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(store.clone())
        .with_reference(reference.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let entry = resolver.resolve(&subject).await;

    assert_eq!(reference.calls(), 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(entry.start_year, Some(1944));
    assert_eq!(entry.created_at, stale.created_at);
    assert_eq!(store.get("101").await, Some(entry));
}

#[tokio::test]
async fn test_pattern_match_short_circuits_later_tiers() {
    let reference = FakeReference::found(1800);
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(reference.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let subject = subject(
        "102",
        "Glory",
        Some("The story is set in 1863, during the American Civil War."),
        &[Genre::War],
    );
    let entry = resolver.resolve(&subject).await;

    assert_eq!(entry.start_year, Some(1863));
    assert_eq!(entry.source, AttributionSource::Pattern);
    assert_eq!(reference.calls(), 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_reference_match_short_circuits_inference() {
    let reference = FakeReference::found(1912);
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(reference.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let entry = resolver.resolve(&opaque_subject("103")).await;

    assert_eq!(entry.start_year, Some(1912));
    assert_eq!(entry.source, AttributionSource::Reference);
    assert_eq!(entry.reliability, Reliability::High);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_cascade_falls_back_to_third_provider() {
    let limited = FakeProvider::new("deepseek", 1, Reply::RateLimited);
    let garbage = FakeProvider::answering("gemini", 2, "I think it is probably the forties?");
    let valid = FakeProvider::answering(
        "groq",
        3,
        r#"Reasoning first. {"startYear": 1939, "endYear": 1945, "additionalYears": null, "period": "WWII", "confidence": "medium"}"#,
    );
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(FakeReference::new(ReferenceOutcome::NotFound))
        .with_providers(providers(&[valid.clone(), garbage.clone(), limited.clone()]))
        .build();

    let entry = resolver.resolve(&opaque_subject("104")).await;

    assert_eq!(entry.start_year, Some(1939));
    assert_eq!(entry.end_year, Some(1945));
    assert_eq!(entry.period_label.as_str(), "1939-1945");
    assert_eq!(entry.source, AttributionSource::Inference("groq".to_string()));
    assert_eq!(entry.source.tag(), "groq");
    assert_eq!((limited.calls(), garbage.calls(), valid.calls()), (1, 1, 1));
}

#[tokio::test]
async fn test_exhausted_cascade_is_unknown_low_with_last_failure_tag() {
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(FakeReference::new(ReferenceOutcome::NotFound))
        .with_providers(providers(&[
            FakeProvider::new("deepseek", 1, Reply::Error("HTTP 500".to_string())),
            FakeProvider::new("gemini", 2, Reply::RateLimited),
        ]))
        .build();

    let entry = resolver.resolve(&opaque_subject("105")).await;

    assert_eq!(entry.period_label, PeriodLabel::Unknown);
    assert_eq!(entry.reliability, Reliability::Low);
    assert_eq!(entry.source.tag(), "gemini_rate_limit");
    assert_eq!(
        resolver.state("105").await,
        ResolutionState::Resolved { is_final: false }
    );
}

#[tokio::test]
async fn test_reference_error_keeps_unknown_retryable() {
    let reference = FakeReference::new(ReferenceOutcome::Failed("HTTP 503".to_string()));
    let provider = FakeProvider::answering(
        "deepseek",
        1,
        r#"{"startYear": null, "endYear": null, "additionalYears": null, "period": "UNKNOWN", "confidence": "high"}"#,
    );
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(reference.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let entry = resolver.resolve(&opaque_subject("114")).await;

    assert_eq!(entry.period_label, PeriodLabel::Unknown);
    assert_eq!(entry.reliability, Reliability::Low);
    assert_eq!(
        resolver.state("114").await,
        ResolutionState::Resolved { is_final: false }
    );

    resolver.resolve(&opaque_subject("114")).await;
    assert_eq!(reference.calls(), 2);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_reference_timeout_falls_through() {
    let reference = FakeReference::slow(ReferenceOutcome::NotFound, Duration::from_millis(500));
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_reference(reference)
        .with_reference_timeout(Duration::from_millis(20))
        .with_providers(providers(&[provider.clone()]))
        .build();

    let entry = resolver.resolve(&opaque_subject("106")).await;

    assert_eq!(entry.start_year, Some(1944));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_fantasy_franchise_beats_stray_number() {
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let subject = subject(
        "107",
        "The Lord of the Rings: The Fellowship of the Ring",
        Some("Frodo sets out from the Shire, in a tale first published in 1954."),
        &[Genre::Fantasy, Genre::Family],
    );
    let entry = resolver.resolve(&subject).await;

    assert_eq!(entry.period_label, PeriodLabel::NoPeriod);
    assert_eq!(entry.reliability, Reliability::High);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_civil_war_keyword_is_genre_gated() {
    let gated = subject("108", "Brothers", Some("A family torn apart by the civil war."), &[Genre::Action]);
    let open = subject("109", "Brothers", Some("A family torn apart by the civil war."), &[Genre::War]);
    let resolver = Resolver::builder(ephemeral_store()).build();

    let gated_entry = resolver.resolve(&gated).await;
    let open_entry = resolver.resolve(&open).await;

    assert_eq!(gated_entry.start_year, None);
    assert_eq!(open_entry.start_year, Some(1863));
    assert_eq!(open_entry.source, AttributionSource::Keyword);
}

#[tokio::test]
async fn test_request_returns_placeholder_then_calls_back() {
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_providers(providers(&[provider]))
        .build();
    let (tx, rx) = oneshot::channel();

    let lookup = resolver
        .request(
            opaque_subject("110"),
            Some(Box::new(move |entry: AttributionEntry| {
                let _ = tx.send(entry);
            })),
        )
        .await;

    let Lookup::Pending { placeholder, handle } = lookup else {
        panic!("expected a pending placeholder");
    };
    assert!(placeholder.is_pending());
    assert_eq!(placeholder.period_label.display(), "analyzing…");

    let finished = handle.await.unwrap().unwrap();
    let reported = rx.await.unwrap();
    assert_eq!(reported, finished);
    assert_eq!(finished.start_year, Some(1944));

    match resolver.request(opaque_subject("110"), None).await {
        Lookup::Ready(entry) => assert_eq!(entry, finished),
        Lookup::Pending { .. } => panic!("final entry should be served from cache"),
    }
}

#[tokio::test]
async fn test_untracked_subject_result_is_discarded() {
    let provider = FakeProvider::slow(
        "deepseek",
        1,
        Reply::Text(GOOD_ANSWER.to_string()),
        Duration::from_millis(100),
    );
    let store = ephemeral_store();
    let resolver = Resolver::builder(store.clone())
        .with_providers(providers(&[provider.clone()]))
        .build();
    let (tx, mut rx) = oneshot::channel::<AttributionEntry>();

    let lookup = resolver
        .request(
            opaque_subject("111"),
            Some(Box::new(move |entry| {
                let _ = tx.send(entry);
            })),
        )
        .await;
    let Lookup::Pending { handle, .. } = lookup else {
        panic!("expected a pending placeholder");
    };

    // Let the provider call start, then drop the subject
    tokio::time::sleep(Duration::from_millis(20)).await;
    resolver.untrack("111").await;

    assert!(handle.await.unwrap().is_none());
    assert!(rx.try_recv().is_err());
    assert!(store.get("111").await.is_none());
    assert_eq!(resolver.state("111").await, ResolutionState::Unresolved);
}

#[tokio::test]
async fn test_override_is_verified_and_skips_tiers() {
    let provider = FakeProvider::answering("deepseek", 1, GOOD_ANSWER);
    let resolver = Resolver::builder(ephemeral_store())
        .with_providers(providers(&[provider.clone()]))
        .build();

    let entry = resolver
        .apply_override(UserOverride {
            subject_id: "112".to_string(),
            start_year: Some(1588),
            end_year: Some(1600),
            period_label: None,
        })
        .await
        .unwrap();
    assert_eq!(entry.reliability, Reliability::Verified);
    assert_eq!(entry.source, AttributionSource::UserSupplied);
    assert_eq!(entry.period_label.as_str(), "1588-1600");

    let resolved = resolver.resolve(&opaque_subject("112")).await;
    assert_eq!(resolved, entry);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_science_fiction_sentinel_stays_retryable() {
    let provider = FakeProvider::answering(
        "deepseek",
        1,
        r#"{"startYear": null, "endYear": null, "additionalYears": null, "period": "NEAR_FUTURE", "confidence": "high"}"#,
    );
    let resolver = Resolver::builder(ephemeral_store())
        .with_providers(providers(&[provider.clone()]))
        .build();
    let subject = subject("113", "Signal", Some("An engineer hears a voice."), &[Genre::ScienceFiction]);

    let first = resolver.resolve(&subject).await;
    assert_eq!(first.period_label, PeriodLabel::NearFuture);
    assert_eq!(first.reliability, Reliability::Low);

    resolver.resolve(&subject).await;
    assert_eq!(provider.calls(), 2);
}
