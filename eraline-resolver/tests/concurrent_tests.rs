//! Concurrent resolutions
//!
//! Subjects resolve independently; concurrent writes of the same subject
//! converge to one durable row.

mod helpers;

use eraline_resolver::cache::DurableStore;
use eraline_resolver::inference::InferenceProvider;
use eraline_resolver::models::Reliability;
use eraline_resolver::Resolver;
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_many_subjects_resolve_concurrently() {
    let temp_dir = TempDir::new().unwrap();
    let (store, durable) = sqlite_store(temp_dir.path(), CACHE_VERSION).await;
    let provider = FakeProvider::slow(
        "deepseek",
        1,
        Reply::Text(r#"{"startYear": 1944, "endYear": null, "confidence": "high"}"#.to_string()),
        Duration::from_millis(10),
    );
    let resolver = Resolver::builder(store.clone())
        .with_providers(vec![provider.clone() as Arc<dyn InferenceProvider>])
        .build();

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let resolver = resolver.clone();
        join_set.spawn(async move { resolver.resolve(&opaque_subject(&format!("30{}", i))).await });
    }

    let mut resolved = 0;
    while let Some(result) = join_set.join_next().await {
        let entry = result.unwrap();
        assert_eq!(entry.reliability, Reliability::High);
        resolved += 1;
    }
    store.flush().await;

    assert_eq!(resolved, 10);
    assert_eq!(provider.calls(), 10);
    assert_eq!(durable.list_all().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_same_subject_converges_to_one_row() {
    let temp_dir = TempDir::new().unwrap();
    let (store, durable) = sqlite_store(temp_dir.path(), CACHE_VERSION).await;
    let resolver = Resolver::builder(store.clone())
        .with_providers(vec![FakeProvider::slow(
            "deepseek",
            1,
            Reply::Text(r#"{"startYear": 1912, "endYear": null, "confidence": "high"}"#.to_string()),
            Duration::from_millis(10),
        ) as Arc<dyn InferenceProvider>])
        .build();

    let mut join_set = JoinSet::new();
    for _ in 0..5 {
        let resolver = resolver.clone();
        join_set.spawn(async move { resolver.resolve(&opaque_subject("310")).await });
    }
    while let Some(result) = join_set.join_next().await {
        assert_eq!(result.unwrap().start_year, Some(1912));
    }
    store.flush().await;

    let rows = durable.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start_year, Some(1912));
}
