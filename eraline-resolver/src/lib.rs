//! eraline-resolver: temporal attribution resolver
//!
//! Given a subject's metadata, determine the historical period its story is
//! set in. Resolution is a tiered cascade:
//!
//! 1. attribution cache (ephemeral, then durable)
//! 2. pattern extractor over title and synopsis
//! 3. reference knowledge base lookup
//! 4. inference providers in priority order
//!
//! Every result carries a reliability grade; non-final grades are re-resolved
//! on their next lookup.

pub mod cache;
pub mod error;
pub mod extractors;
pub mod inference;
pub mod models;
pub mod services;
pub mod validators;
pub mod workflow;

pub use crate::error::{ResolverError, Result};
pub use crate::workflow::{Lookup, ResolutionState, Resolver};

use crate::cache::{AttributionStore, SqliteDurableStore};
use crate::inference::build_providers;
use crate::services::{TmdbClient, WikipediaClient};
use eraline_common::config::{resolve_api_key, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the production store: SQLite durable layer plus the snapshot file
pub async fn build_store(config: &TomlConfig) -> Result<Arc<AttributionStore>> {
    let db_path = config.database_path();
    let pool = eraline_common::db::init_database(&db_path).await?;
    info!(path = %db_path.display(), "Durable store ready");

    let store = AttributionStore::new(config.cache_version, Some(Arc::new(SqliteDurableStore::new(pool))))
        .with_snapshot_path(config.snapshot_path());
    match store.load_snapshot().await {
        Ok(true) => info!(entries = store.ephemeral().len().await, "Restored cache snapshot"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable cache snapshot"),
    }

    Ok(Arc::new(store))
}

/// Wire a resolver from configuration
pub async fn build_resolver(config: &TomlConfig) -> Result<Resolver> {
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let store = build_store(config).await?;

    let mut builder = Resolver::builder(store)
        .with_provider_timeout(timeout)
        .with_providers(build_providers(&config.providers, timeout)?);

    if config.reference.enabled {
        let reference = WikipediaClient::new(&config.reference, timeout)
            .map_err(|e| ResolverError::Reference(e.to_string()))?;
        // A lookup may issue several searches and extract fetches
        builder = builder
            .with_reference(Arc::new(reference))
            .with_reference_timeout(timeout * 3);
    }

    Ok(builder.build())
}

/// TMDb client, when an API key is configured
pub fn build_metadata_provider(config: &TomlConfig) -> Result<Option<TmdbClient>> {
    let Some(api_key) = resolve_api_key("tmdb", config.metadata.api_key.as_deref()) else {
        return Ok(None);
    };
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    TmdbClient::new(&config.metadata, api_key, timeout).map(Some)
}
