//! Upstream metadata provider
//!
//! Read-only input to the resolver: title, original title, release date,
//! synopsis in two locales and genre tags.

use crate::error::{ResolverError, Result};
use crate::models::{Genre, SubjectMetadata};
use async_trait::async_trait;
use chrono::NaiveDate;
use eraline_common::config::MetadataConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of subject metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, subject_id: &str) -> Result<SubjectMetadata>;
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetails {
    id: u64,
    title: String,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
}

fn parse_release_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// TMDb movie details client
pub struct TmdbClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    primary_language: String,
    secondary_language: String,
}

impl TmdbClient {
    pub fn new(config: &MetadataConfig, api_key: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::Metadata(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            primary_language: config.primary_language.clone(),
            secondary_language: config.secondary_language.clone(),
        })
    }

    async fn details(&self, subject_id: &str, language: &str) -> Result<TmdbMovieDetails> {
        let url = format!("{}/movie/{}", self.base_url, subject_id);
        debug!(subject_id, language, "Fetching TMDb details");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", language)])
            .send()
            .await
            .map_err(|e| ResolverError::Metadata(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::Metadata(format!(
                "TMDb returned {} for subject {}",
                status, subject_id
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ResolverError::Metadata(format!("parse failed: {}", e)))
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn fetch(&self, subject_id: &str) -> Result<SubjectMetadata> {
        let primary = self.details(subject_id, &self.primary_language).await?;

        // Secondary locale only contributes a synopsis; its failure is tolerated
        let synopsis_secondary = match self.details(subject_id, &self.secondary_language).await {
            Ok(secondary) => secondary.overview.filter(|o| !o.trim().is_empty()),
            Err(e) => {
                warn!(subject_id, error = %e, "Secondary-locale details unavailable");
                None
            }
        };

        Ok(SubjectMetadata {
            subject_id: primary.id.to_string(),
            title: primary.title,
            original_title: primary.original_title,
            release_date: parse_release_date(primary.release_date.as_deref()),
            synopsis: primary.overview.filter(|o| !o.trim().is_empty()),
            synopsis_secondary,
            genres: primary
                .genres
                .iter()
                .filter_map(|g| Genre::from_tmdb_id(g.id))
                .collect(),
        })
    }
}
