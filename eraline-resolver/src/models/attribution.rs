//! Attribution entry: the resolved in-story period of one subject

use super::subject::SubjectMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum gap (years) between eras for a subject to count as multi-era
pub const MATERIALITY_GAP_YEARS: i32 = 20;

/// Trust level of a resolved attribution
///
/// Only `Verified` and `High` are final; anything lower is re-resolved on the next lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    Low,
    Medium,
    High,
    Verified,
}

impl Reliability {
    pub fn is_final(self) -> bool {
        matches!(self, Reliability::High | Reliability::Verified)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reliability::Low => "low",
            Reliability::Medium => "medium",
            Reliability::High => "high",
            Reliability::Verified => "verified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Reliability::Low),
            "medium" => Some(Reliability::Medium),
            "high" => Some(Reliability::High),
            "verified" => Some(Reliability::Verified),
            _ => None,
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence reported by the tier that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Lenient parse of provider output ("High", " medium ", "LOW")
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" | "mid" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Which tier produced (or failed to produce) an attribution
///
/// Stored as a flat tag string; inference outcomes carry the provider name
/// (`gemini`, `gemini_rate_limit`, `gemini_error`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AttributionSource {
    Pattern,
    Keyword,
    Reference,
    ReferenceNotFound,
    ReferenceNoPeriod,
    ReferenceError,
    Inference(String),
    InferenceRateLimited(String),
    InferenceError(String),
    UserSupplied,
    Unresolved,
}

impl AttributionSource {
    pub fn tag(&self) -> String {
        match self {
            AttributionSource::Pattern => "pattern".to_string(),
            AttributionSource::Keyword => "keyword".to_string(),
            AttributionSource::Reference => "reference_lookup".to_string(),
            AttributionSource::ReferenceNotFound => "reference_not_found".to_string(),
            AttributionSource::ReferenceNoPeriod => "reference_no_period".to_string(),
            AttributionSource::ReferenceError => "reference_error".to_string(),
            AttributionSource::Inference(p) => p.clone(),
            AttributionSource::InferenceRateLimited(p) => format!("{}_rate_limit", p),
            AttributionSource::InferenceError(p) => format!("{}_error", p),
            AttributionSource::UserSupplied => "user_supplied".to_string(),
            AttributionSource::Unresolved => "unresolved".to_string(),
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "pattern" => AttributionSource::Pattern,
            "keyword" => AttributionSource::Keyword,
            "reference_lookup" => AttributionSource::Reference,
            "reference_not_found" => AttributionSource::ReferenceNotFound,
            "reference_no_period" => AttributionSource::ReferenceNoPeriod,
            "reference_error" => AttributionSource::ReferenceError,
            "user_supplied" => AttributionSource::UserSupplied,
            "unresolved" | "" => AttributionSource::Unresolved,
            other => {
                if let Some(provider) = other.strip_suffix("_rate_limit") {
                    AttributionSource::InferenceRateLimited(provider.to_string())
                } else if let Some(provider) = other.strip_suffix("_error") {
                    AttributionSource::InferenceError(provider.to_string())
                } else {
                    AttributionSource::Inference(other.to_string())
                }
            }
        }
    }

    /// The tier call behind this source failed (rate limit or error)
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AttributionSource::ReferenceError
                | AttributionSource::InferenceRateLimited(_)
                | AttributionSource::InferenceError(_)
        )
    }

    /// Reference lookup ran cleanly and found nothing usable
    pub fn is_reference_miss(&self) -> bool {
        matches!(
            self,
            AttributionSource::ReferenceNotFound | AttributionSource::ReferenceNoPeriod
        )
    }
}

impl From<AttributionSource> for String {
    fn from(source: AttributionSource) -> Self {
        source.tag()
    }
}

impl From<String> for AttributionSource {
    fn from(tag: String) -> Self {
        AttributionSource::parse(&tag)
    }
}

impl fmt::Display for AttributionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Human-readable period or reserved sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PeriodLabel {
    /// Rendered concrete period ("1944", "1939-1945", "44 BC")
    Period(String),
    /// Intentionally timeless (fantasy)
    NoPeriod,
    /// Mythic, unanchored past
    LongAgo,
    /// Unanchored near future
    NearFuture,
    /// Resolution failed
    Unknown,
    /// Placeholder while resolution runs; never persisted
    Pending,
}

impl PeriodLabel {
    pub fn as_str(&self) -> &str {
        match self {
            PeriodLabel::Period(label) => label,
            PeriodLabel::NoPeriod => "NO_PERIOD",
            PeriodLabel::LongAgo => "LONG_AGO",
            PeriodLabel::NearFuture => "NEAR_FUTURE",
            PeriodLabel::Unknown => "UNKNOWN",
            PeriodLabel::Pending => "PENDING",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "NO_PERIOD" => PeriodLabel::NoPeriod,
            "LONG_AGO" => PeriodLabel::LongAgo,
            "NEAR_FUTURE" => PeriodLabel::NearFuture,
            "UNKNOWN" | "" => PeriodLabel::Unknown,
            "PENDING" => PeriodLabel::Pending,
            other => PeriodLabel::Period(other.to_string()),
        }
    }

    /// One of `NO_PERIOD`, `LONG_AGO`, `NEAR_FUTURE`
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            PeriodLabel::NoPeriod | PeriodLabel::LongAgo | PeriodLabel::NearFuture
        )
    }

    /// Text shown to users
    pub fn display(&self) -> &str {
        match self {
            PeriodLabel::Pending => "analyzing…",
            other => other.as_str(),
        }
    }
}

impl From<PeriodLabel> for String {
    fn from(label: PeriodLabel) -> Self {
        label.as_str().to_string()
    }
}

impl From<String> for PeriodLabel {
    fn from(value: String) -> Self {
        PeriodLabel::parse(&value)
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Render a year, negative years as BC
fn format_year(year: i32) -> String {
    if year < 0 {
        format!("{} BC", year.unsigned_abs())
    } else {
        year.to_string()
    }
}

/// Render a concrete period label ("1944", "1939-1945", "44 BC")
pub fn format_period(start_year: i32, end_year: Option<i32>) -> String {
    match end_year {
        Some(end) if end != start_year => {
            format!("{}-{}", format_year(start_year), format_year(end))
        }
        _ => format_year(start_year),
    }
}

/// A tier's answer: years plus label, before grading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub additional_years: Vec<i32>,
    pub label: PeriodLabel,
}

impl Period {
    /// Concrete period; label rendered from the years
    ///
    /// Additional years are sorted, deduplicated, stripped of the start/end
    /// years and dropped entirely unless they reach past the materiality gap.
    pub fn years(start_year: i32, end_year: Option<i32>, additional_years: Vec<i32>) -> Self {
        let end_year = end_year.filter(|end| *end != start_year);
        let mut additional: Vec<i32> = additional_years
            .into_iter()
            .filter(|y| *y != start_year && Some(*y) != end_year)
            .collect();
        additional.sort_unstable();
        additional.dedup();

        let material = additional
            .iter()
            .any(|y| (y - start_year).abs() > MATERIALITY_GAP_YEARS);
        if !material {
            additional.clear();
        }

        Self {
            start_year: Some(start_year),
            end_year,
            additional_years: additional,
            label: PeriodLabel::Period(format_period(start_year, end_year)),
        }
    }

    pub fn sentinel(label: PeriodLabel) -> Self {
        Self {
            start_year: None,
            end_year: None,
            additional_years: Vec::new(),
            label,
        }
    }

    pub fn unknown() -> Self {
        Self::sentinel(PeriodLabel::Unknown)
    }

    /// A concrete year or a sentinel label (ends the tier cascade)
    pub fn is_usable(&self) -> bool {
        self.start_year.is_some() || self.label.is_sentinel()
    }
}

/// Explicit user-supplied period, written as `Verified` without running any tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOverride {
    pub subject_id: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    /// Sentinel label when no start year is given; with years it must match
    /// the label rendered from them
    pub period_label: Option<String>,
}

/// The unit of knowledge about one subject's setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionEntry {
    pub subject_id: String,
    pub canonical_title: String,
    pub original_title: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    /// Secondary eras; empty when absent
    #[serde(default)]
    pub additional_years: Vec<i32>,
    pub period_label: PeriodLabel,
    pub reliability: Reliability,
    pub source: AttributionSource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttributionEntry {
    pub fn from_period(
        subject: &SubjectMetadata,
        period: Period,
        reliability: Reliability,
        source: AttributionSource,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            subject_id: subject.subject_id.clone(),
            canonical_title: subject.title.clone(),
            original_title: subject.original_title.clone(),
            start_year: period.start_year,
            end_year: period.end_year,
            additional_years: period.additional_years,
            period_label: period.label,
            reliability,
            source,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholder returned while resolution runs in the background
    pub fn pending(subject: &SubjectMetadata) -> Self {
        Self::from_period(
            subject,
            Period::sentinel(PeriodLabel::Pending),
            Reliability::Low,
            AttributionSource::Unresolved,
            None,
        )
    }

    pub fn is_final(&self) -> bool {
        self.reliability.is_final()
    }

    pub fn is_pending(&self) -> bool {
        self.period_label == PeriodLabel::Pending
    }

    pub fn period(&self) -> Period {
        Period {
            start_year: self.start_year,
            end_year: self.end_year,
            additional_years: self.additional_years.clone(),
            label: self.period_label.clone(),
        }
    }

    /// Check the entry-level invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.subject_id.trim().is_empty() {
            return Err("subject_id must not be empty".to_string());
        }
        if self.start_year.is_none() {
            let allowed = self.period_label.is_sentinel()
                || matches!(
                    self.period_label,
                    PeriodLabel::Unknown | PeriodLabel::Pending
                );
            if !allowed {
                return Err(format!(
                    "label {:?} requires a start year",
                    self.period_label.as_str()
                ));
            }
            if !self.additional_years.is_empty() {
                return Err("additional years require a start year".to_string());
            }
            if self.end_year.is_some() {
                return Err("end year requires a start year".to_string());
            }
        }
        Ok(())
    }
}
