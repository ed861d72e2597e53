//! Reference knowledge base client
//!
//! Searches a public encyclopedia (opensearch) in each configured locale,
//! merges candidate articles by normalized title, fetches each article's intro
//! and re-runs the year patterns against that richer prose.

use crate::extractors::keywords::match_reference_keyword;
use crate::extractors::patterns::{aggregate_years, extract_century_years, title_year};
use crate::extractors::{extract_direct, DirectOptions, DirectTier};
use crate::models::{Confidence, Period, SubjectMetadata};
use async_trait::async_trait;
use eraline_common::config::ReferenceConfig;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// Range matches in prose wider than this are production spans, not settings
pub const MAX_PROSE_RANGE_SPAN: i32 = 50;

/// Intro sentences fetched per article
const EXTRACT_SENTENCES: u32 = 10;

const DEFAULT_ENDPOINT: &str = "https://{locale}.wikipedia.org/w/api.php";

/// A usable period found in reference prose
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatch {
    pub period: Period,
    pub confidence: Confidence,
    /// Article the period came from
    pub article: String,
    pub detail: String,
}

/// Outcome of one reference lookup
///
/// `NotFound` and `NoPeriod` are clean misses, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    Found(ReferenceMatch),
    /// No candidate article
    NotFound,
    /// Articles found, no temporal phrase recognized
    NoPeriod,
    /// Transport or protocol failure
    Failed(String),
}

/// Reference lookup tier
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn lookup(&self, subject: &SubjectMetadata) -> ReferenceOutcome;
}

static PROSE_DECADE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\b(?:set in|takes place in|set during)\s+the\s+([0-9]{4})s\b").ok()
});

static PROSE_EXPLICIT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"\b(?:set in|takes place in|set during|taking place in|occurs in|happening in)\s+([0-9]{4})\b",
    )
    .ok()
});

static PROSE_CONTEXT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b(?:during|circa|around|about)\s+([0-9]{4})\b").ok());

fn first_year(regex: &Lazy<Option<Regex>>, text: &str) -> Option<(i32, String)> {
    let caps = regex.as_ref()?.captures(text)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    Some((year, caps.get(0)?.as_str().to_string()))
}

fn in_window(year: i32) -> bool {
    (crate::extractors::patterns::MIN_VALID_YEAR..=crate::extractors::patterns::MAX_VALID_YEAR)
        .contains(&year)
}

/// Find a period in reference prose
///
/// Explicit "set in" phrasing yields High confidence, everything else Medium.
pub fn extract_from_prose(
    prose: &str,
    release_year: Option<i32>,
    title_year: Option<i32>,
) -> Option<(Period, Confidence, String)> {
    let text = prose.to_lowercase();

    if let Some((decade, context)) = first_year(&PROSE_DECADE, &text) {
        if in_window(decade) {
            return Some((Period::years(decade, Some(decade + 9), Vec::new()), Confidence::High, context));
        }
    }

    if let Some((year, context)) = first_year(&PROSE_EXPLICIT, &text) {
        if in_window(year) && Some(year) != release_year {
            return Some((Period::years(year, None, Vec::new()), Confidence::High, context));
        }
    }

    let options = DirectOptions {
        release_year,
        title_year,
        max_range_span: Some(MAX_PROSE_RANGE_SPAN),
    };
    if let Some(direct) = extract_direct(&text, &options) {
        let confidence = match direct.tier {
            DirectTier::LeadingYear | DirectTier::Explicit => Confidence::High,
            _ => Confidence::Medium,
        };
        // Prose also mentions production dates; those are not secondary eras
        let mut period = direct.period;
        period.additional_years.clear();
        return Some((period, confidence, direct.context));
    }

    if let Some((year, context)) = first_year(&PROSE_CONTEXT, &text) {
        if in_window(year) && Some(year) != release_year {
            return Some((Period::years(year, None, Vec::new()), Confidence::Medium, context));
        }
    }

    let century_years = extract_century_years(&text);
    if !century_years.is_empty() {
        return Some((
            aggregate_years(&century_years, None, None),
            Confidence::Medium,
            "century expression".to_string(),
        ));
    }

    match_reference_keyword(&text).map(|(key, year)| {
        (Period::years(year, None, Vec::new()), Confidence::Medium, format!("keyword: {}", key))
    })
}

/// Normalized title used to merge candidates across locales
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let without_suffix = match lowered.rfind(" (") {
        Some(idx) if lowered.ends_with(')') => &lowered[..idx],
        _ => lowered.as_str(),
    };
    without_suffix
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    extract: Option<String>,
}

/// Wikipedia-backed reference lookup
pub struct WikipediaClient {
    http_client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    locales: Vec<String>,
    max_candidates: usize,
    endpoint_template: String,
}

impl WikipediaClient {
    pub fn new(config: &ReferenceConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;

        // Polite ceiling: 5 requests/second across all locales
        let per_second = NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            locales: config.locales.clone(),
            max_candidates: config.max_candidates.max(1),
            endpoint_template: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Override the API endpoint; `{locale}` is substituted per request
    pub fn with_endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.endpoint_template = template.into();
        self
    }

    fn endpoint(&self, locale: &str) -> String {
        self.endpoint_template.replace("{locale}", locale)
    }

    async fn search(&self, locale: &str, query: &str) -> Result<Vec<String>, String> {
        self.rate_limiter.until_ready().await;

        let limit = self.max_candidates.to_string();
        let response = self
            .http_client
            .get(self.endpoint(locale))
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| format!("opensearch request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("opensearch returned {}", response.status()));
        }

        // [query, [titles], [descriptions], [urls]]
        let body: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| format!("opensearch parse failed: {}", e))?;

        Ok(body
            .get(1)
            .and_then(|v| v.as_array())
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_extract(&self, locale: &str, title: &str) -> Result<Option<String>, String> {
        self.rate_limiter.until_ready().await;

        let sentences = EXTRACT_SENTENCES.to_string();
        let response = self
            .http_client
            .get(self.endpoint(locale))
            .query(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exsentences", sentences.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| format!("extract request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("extract returned {}", response.status()));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| format!("extract parse failed: {}", e))?;

        Ok(body
            .query
            .and_then(|q| q.pages.into_values().find_map(|p| p.extract))
            .filter(|e| !e.trim().is_empty()))
    }
}

#[async_trait]
impl ReferenceLookup for WikipediaClient {
    async fn lookup(&self, subject: &SubjectMetadata) -> ReferenceOutcome {
        let release_year = subject.release_year();
        let query = match release_year {
            Some(year) => format!("{} {} film", subject.search_title(), year),
            None => format!("{} film", subject.search_title()),
        };

        // Primary locale first, then the rest; dedupe by normalized title
        let mut seen = HashSet::new();
        let mut candidates: Vec<(String, String)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for locale in &self.locales {
            match self.search(locale, &query).await {
                Ok(titles) => {
                    debug!(subject_id = %subject.subject_id, locale, count = titles.len(), "Reference search");
                    for title in titles {
                        if seen.insert(normalize_title(&title)) {
                            candidates.push((locale.clone(), title));
                        }
                    }
                }
                Err(e) => {
                    warn!(subject_id = %subject.subject_id, locale, error = %e, "Reference search failed");
                    failures.push(e);
                }
            }
        }

        if candidates.is_empty() {
            if !failures.is_empty() && failures.len() == self.locales.len() {
                return ReferenceOutcome::Failed(failures.join("; "));
            }
            return ReferenceOutcome::NotFound;
        }

        let title_year = title_year(&subject.title_text());
        let mut fetched = 0usize;
        for (locale, title) in &candidates {
            let extract = match self.fetch_extract(locale, title).await {
                Ok(Some(extract)) => extract,
                Ok(None) => continue,
                Err(e) => {
                    warn!(subject_id = %subject.subject_id, article = %title, error = %e, "Extract fetch failed");
                    failures.push(e);
                    continue;
                }
            };
            fetched += 1;

            if let Some((period, confidence, context)) =
                extract_from_prose(&extract, release_year, title_year)
            {
                debug!(subject_id = %subject.subject_id, article = %title, year = ?period.start_year, "Reference period found");
                return ReferenceOutcome::Found(ReferenceMatch {
                    period,
                    confidence,
                    article: title.clone(),
                    detail: context,
                });
            }
        }

        if fetched == 0 && !failures.is_empty() {
            return ReferenceOutcome::Failed(failures.join("; "));
        }
        ReferenceOutcome::NoPeriod
    }
}
