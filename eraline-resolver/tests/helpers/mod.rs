//! Test helpers
//!
//! Call-counting fakes for the resolver's collaborators plus subject and
//! store builders.

#![allow(dead_code)]

use async_trait::async_trait;
use eraline_resolver::cache::{AttributionStore, DurableStore, SqliteDurableStore};
use eraline_resolver::error::{ResolverError, Result};
use eraline_resolver::inference::{InferenceProvider, ProviderSpec};
use eraline_resolver::models::{
    AttributionEntry, Confidence, Genre, Period, SubjectMetadata,
};
use eraline_resolver::services::{ReferenceLookup, ReferenceMatch, ReferenceOutcome};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CACHE_VERSION: u32 = 13;

pub fn subject(id: &str, title: &str, synopsis: Option<&str>, genres: &[Genre]) -> SubjectMetadata {
    let mut subject = SubjectMetadata::new(id, title);
    subject.synopsis = synopsis.map(str::to_string);
    subject.genres = genres.to_vec();
    subject
}

/// Subject the pattern tier cannot resolve
pub fn opaque_subject(id: &str) -> SubjectMetadata {
    subject(id, "A Quiet Film", Some("Two strangers meet on a train."), &[Genre::Drama])
}

pub fn ephemeral_store() -> Arc<AttributionStore> {
    Arc::new(AttributionStore::new(CACHE_VERSION, None))
}

/// SQLite file store under `dir`
pub async fn sqlite_store(dir: &Path, version: u32) -> (Arc<AttributionStore>, SqliteDurableStore) {
    let pool = eraline_common::db::init_database(&dir.join("eraline.db"))
        .await
        .unwrap();
    let durable = SqliteDurableStore::new(pool);
    let store = AttributionStore::new(version, Some(Arc::new(durable.clone())));
    (Arc::new(store), durable)
}

/// Reference lookup returning a fixed outcome
pub struct FakeReference {
    outcome: ReferenceOutcome,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeReference {
    pub fn new(outcome: ReferenceOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(outcome: ReferenceOutcome, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn found(year: i32) -> Arc<Self> {
        Self::new(ReferenceOutcome::Found(ReferenceMatch {
            period: Period::years(year, None, vec![]),
            confidence: Confidence::High,
            article: "Article".to_string(),
            detail: format!("set in {}", year),
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceLookup for FakeReference {
    async fn lookup(&self, _subject: &SubjectMetadata) -> ReferenceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Scripted provider reply
#[derive(Clone)]
pub enum Reply {
    Text(String),
    RateLimited,
    Error(String),
}

/// Inference provider replaying a fixed reply
pub struct FakeProvider {
    spec: ProviderSpec,
    reply: Reply,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeProvider {
    pub fn new(name: &str, priority: u32, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            spec: ProviderSpec::new(name, priority),
            reply,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn answering(name: &str, priority: u32, json: &str) -> Arc<Self> {
        Self::new(name, priority, Reply::Text(json.to_string()))
    }

    pub fn slow(name: &str, priority: u32, reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            spec: ProviderSpec::new(name, priority),
            reply,
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for FakeProvider {
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::RateLimited => Err(ResolverError::rate_limited(&self.spec.name)),
            Reply::Error(message) => Err(ResolverError::provider(&self.spec.name, message.clone())),
        }
    }
}

/// Durable store that is always down
#[derive(Default)]
pub struct UnavailableStore {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

#[async_trait]
impl DurableStore for UnavailableStore {
    async fn get(&self, _subject_id: &str) -> Result<Option<AttributionEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(ResolverError::StoreUnavailable("connection refused".to_string()))
    }

    async fn upsert(&self, _entry: &AttributionEntry) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(ResolverError::StoreUnavailable("connection refused".to_string()))
    }

    async fn get_many(&self, _subject_ids: &[String]) -> Result<Vec<AttributionEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(ResolverError::StoreUnavailable("connection refused".to_string()))
    }

    async fn delete(&self, _subject_id: &str) -> Result<bool> {
        Err(ResolverError::StoreUnavailable("connection refused".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<AttributionEntry>> {
        Err(ResolverError::StoreUnavailable("connection refused".to_string()))
    }
}
