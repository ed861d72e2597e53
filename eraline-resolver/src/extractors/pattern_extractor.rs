//! Pattern extractor: the first resolution tier
//!
//! Order of evaluation:
//! 1. Sentinels (explicit fantasy, "a long time ago") short-circuit everything
//! 2. Direct year tiers, first tier with a match wins
//! 3. Century expressions (confidence capped at Medium)
//! 4. Curated keyword table, highest priority group only

use super::keywords::{
    best_priority_matches, contains_any, FANTASY_FRANCHISES, FANTASY_KEYWORDS, LONG_AGO_PHRASES,
};
use super::patterns::{aggregate_years, extract_century_years, extract_direct, title_year, DirectOptions};
use crate::models::{AttributionSource, Confidence, Genre, Period, PeriodLabel, SubjectMetadata};
use tracing::debug;

/// Result of a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub period: Period,
    pub confidence: Confidence,
    /// `Pattern` or `Keyword`
    pub source: AttributionSource,
    /// Human-readable provenance
    pub detail: String,
}

/// Title/synopsis pattern extractor
#[derive(Debug, Clone, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a period, or `None` when nothing matched (escalate to the next tier)
    pub fn extract(&self, subject: &SubjectMetadata) -> Option<Extraction> {
        let text = subject.combined_text();

        if let Some(sentinel) = self.check_sentinels(subject, &text) {
            return Some(sentinel);
        }

        let options = DirectOptions {
            release_year: subject.release_year(),
            title_year: title_year(&subject.title_text()),
            max_range_span: None,
        };

        if let Some(direct) = extract_direct(&text, &options) {
            return Some(Extraction {
                period: direct.period,
                confidence: direct.confidence,
                source: AttributionSource::Pattern,
                detail: format!("{} pattern: \"{}\"", direct.tier.name(), direct.context),
            });
        }

        let century_years = extract_century_years(&text);
        if !century_years.is_empty() {
            debug!(subject_id = %subject.subject_id, years = ?century_years, "Century expression matched");
            return Some(Extraction {
                period: aggregate_years(&century_years, None, options.title_year),
                confidence: Confidence::Medium,
                source: AttributionSource::Pattern,
                detail: "century expression".to_string(),
            });
        }

        let keywords = best_priority_matches(&text, &subject.genres);
        if !keywords.is_empty() {
            let years: Vec<i32> = keywords.iter().map(|k| k.year).collect();
            let keys: Vec<&str> = keywords.iter().map(|k| k.key).collect();
            debug!(subject_id = %subject.subject_id, ?keys, "Keyword table matched");
            return Some(Extraction {
                period: aggregate_years(&years, None, options.title_year),
                confidence: Confidence::Medium,
                source: AttributionSource::Keyword,
                detail: format!("keywords: {}", keys.join(", ")),
            });
        }

        None
    }

    fn check_sentinels(&self, subject: &SubjectMetadata, text: &str) -> Option<Extraction> {
        let fantasy_phrase =
            contains_any(text, FANTASY_FRANCHISES) || contains_any(text, FANTASY_KEYWORDS);
        if fantasy_phrase && subject.has_genre(Genre::Fantasy) {
            debug!(subject_id = %subject.subject_id, "Explicit fantasy setting");
            return Some(Extraction {
                period: Period::sentinel(PeriodLabel::NoPeriod),
                confidence: Confidence::High,
                source: AttributionSource::Pattern,
                detail: "explicit fantasy setting".to_string(),
            });
        }

        if contains_any(text, LONG_AGO_PHRASES) {
            debug!(subject_id = %subject.subject_id, "Long-ago phrasing");
            return Some(Extraction {
                period: Period::sentinel(PeriodLabel::LongAgo),
                confidence: Confidence::High,
                source: AttributionSource::Pattern,
                detail: "long-ago phrasing".to_string(),
            });
        }

        None
    }
}
