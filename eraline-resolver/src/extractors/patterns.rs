//! Year, range, decade and century patterns
//!
//! Patterns run against lowercased text. Tiers are ordered most specific
//! first; the first tier with any in-window match wins and lower tiers are
//! never merged in.

use crate::models::{Confidence, Period};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, error};

/// Years outside this window are never accepted from direct patterns
pub const MIN_VALID_YEAR: i32 = 1800;
pub const MAX_VALID_YEAR: i32 = 2200;

/// Direct pattern tiers, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirectTier {
    /// Line opening with a year ("1932年、...")
    LeadingYear,
    /// "set in 1970", "takes place in 1912", "舞台は1912年"
    Explicit,
    /// "1940-1945", "from 1940 to 1945"
    Range,
    /// "sent back in time to 1955"
    TimeTravel,
    /// "late 1970s", "1970年代"
    Decade,
    /// "in 1912", "1912年"
    Bare,
}

impl DirectTier {
    pub fn confidence(self) -> Confidence {
        match self {
            DirectTier::LeadingYear | DirectTier::Explicit | DirectTier::Range => Confidence::High,
            DirectTier::TimeTravel | DirectTier::Decade | DirectTier::Bare => Confidence::Medium,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DirectTier::LeadingYear => "leading_year",
            DirectTier::Explicit => "explicit",
            DirectTier::Range => "range",
            DirectTier::TimeTravel => "time_travel",
            DirectTier::Decade => "decade",
            DirectTier::Bare => "bare",
        }
    }
}

const DIRECT_PATTERN_SOURCES: &[(DirectTier, &str)] = &[
    (DirectTier::LeadingYear, r"(?m)^([0-9]{4})年[、,]"),
    (DirectTier::Explicit, r"\bset in ([0-9]{4})\b"),
    (DirectTier::Explicit, r"\btakes place in ([0-9]{4})\b"),
    (DirectTier::Explicit, r"舞台は([0-9]{4})年"),
    (DirectTier::Explicit, r"([0-9]{4})年を舞台"),
    (DirectTier::Range, r"\b([0-9]{4})\s*[-–]\s*([0-9]{4})\b"),
    (DirectTier::Range, r"\bfrom ([0-9]{4}) to ([0-9]{4})\b"),
    (DirectTier::TimeTravel, r"\b(?:back|sent|travel).*?\bto ([0-9]{4})\b"),
    (DirectTier::TimeTravel, r"\b(?:back|sent|travel).*?\bin ([0-9]{4})\b"),
    (DirectTier::Decade, r"\b(?:early|late|mid)\s+([0-9]{4})s\b"),
    (DirectTier::Decade, r"([0-9]{4})年代"),
    (DirectTier::Decade, r"\b([0-9]{4})s\b"),
    (DirectTier::Bare, r"\bin ([0-9]{4})\b"),
    (DirectTier::Bare, r"([0-9]{4})年"),
];

/// Compile a fixed pattern list, logging (and skipping) anything that fails
fn compile_all<T: Copy>(sources: &[(T, &str)]) -> Vec<(T, Regex)> {
    sources
        .iter()
        .filter_map(|(tag, source)| match Regex::new(source) {
            Ok(regex) => Some((*tag, regex)),
            Err(e) => {
                error!(pattern = %source, error = %e, "Failed to compile pattern");
                None
            }
        })
        .collect()
}

static DIRECT_PATTERNS: Lazy<Vec<(DirectTier, Regex)>> =
    Lazy::new(|| compile_all(DIRECT_PATTERN_SOURCES));

/// Century qualifier, as far as it shifts the representative year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenturyQualifier {
    Early,
    Mid,
    Late,
    /// Boundary into the next century
    Turn,
}

const CENTURY_PATTERN_SOURCES: &[(u8, &str)] = &[
    (
        0,
        r"\b(?:(early|mid|late|beginning of the|end of the|turn of the)[\s-]+)?([0-9]{1,2})(?:st|nd|rd|th)\s+century\b",
    ),
    (1, r"\bcentury\s+([0-9]{1,2})\b"),
    (2, r"([0-9]{1,2})世紀(初頭|末|中頃|半ば)?"),
];

static CENTURY_PATTERNS: Lazy<Vec<(u8, Regex)>> =
    Lazy::new(|| compile_all(CENTURY_PATTERN_SOURCES));

static TITLE_YEAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"([0-9]{4})").ok());

fn in_window(year: i32) -> bool {
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year)
}

fn qualifier_from(text: Option<&str>) -> CenturyQualifier {
    match text {
        Some("early") | Some("beginning of the") | Some("初頭") => CenturyQualifier::Early,
        Some("late") | Some("end of the") | Some("末") => CenturyQualifier::Late,
        Some("turn of the") => CenturyQualifier::Turn,
        _ => CenturyQualifier::Mid,
    }
}

/// Representative year of a century expression
pub fn century_to_year(century: i32, qualifier: CenturyQualifier) -> i32 {
    let century_start = (century - 1) * 100;
    match qualifier {
        CenturyQualifier::Early => century_start + 20,
        CenturyQualifier::Mid => century_start + 50,
        CenturyQualifier::Late => century_start + 80,
        CenturyQualifier::Turn => century * 100,
    }
}

/// First four-digit number in a title, if any
pub fn title_year(title_text: &str) -> Option<i32> {
    TITLE_YEAR
        .as_ref()?
        .captures(title_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Options shared by every caller of direct extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectOptions {
    /// Matches equal to the release year are ignored (production, not setting)
    pub release_year: Option<i32>,
    /// Year found in the title; preferred as start year when matched
    pub title_year: Option<i32>,
    /// Range matches spanning more than this are rejected
    pub max_range_span: Option<i32>,
}

/// Winning tier and its aggregated period
#[derive(Debug, Clone, PartialEq)]
pub struct DirectMatch {
    pub tier: DirectTier,
    pub period: Period,
    pub confidence: Confidence,
    /// Matched text, for provenance notes
    pub context: String,
}

/// Run the direct tiers in order, stopping at the first tier with a match
pub fn extract_direct(text: &str, options: &DirectOptions) -> Option<DirectMatch> {
    let mut current: Option<DirectTier> = None;
    let mut years: Vec<i32> = Vec::new();
    let mut first_range: Option<(i32, i32)> = None;
    let mut context: Option<String> = None;

    for (tier, regex) in DIRECT_PATTERNS.iter() {
        if current != Some(*tier) {
            if !years.is_empty() {
                break;
            }
            current = Some(*tier);
        }

        for caps in regex.captures_iter(text) {
            let captured: Vec<i32> = caps
                .iter()
                .skip(1)
                .flatten()
                .filter_map(|m| m.as_str().parse::<i32>().ok())
                .collect();

            if *tier == DirectTier::Range {
                if let (Some(a), Some(b)) = (captured.first(), captured.get(1)) {
                    if let Some(max_span) = options.max_range_span {
                        if (b - a).abs() > max_span {
                            debug!(start = a, end = b, "Rejected wide range match");
                            continue;
                        }
                    }
                }
            }

            let accepted: Vec<i32> = captured
                .into_iter()
                .filter(|y| in_window(*y) && Some(*y) != options.release_year)
                .collect();
            if accepted.is_empty() {
                continue;
            }

            if *tier == DirectTier::Range && accepted.len() == 2 && first_range.is_none() {
                first_range = Some((accepted[0].min(accepted[1]), accepted[0].max(accepted[1])));
            }
            if context.is_none() {
                context = caps.get(0).map(|m| m.as_str().to_string());
            }
            years.extend(accepted);
        }
    }

    let tier = current?;
    if years.is_empty() {
        return None;
    }

    debug!(tier = tier.name(), ?years, "Direct pattern tier matched");
    Some(DirectMatch {
        tier,
        period: aggregate_years(&years, first_range, options.title_year),
        confidence: tier.confidence(),
        context: context.unwrap_or_default(),
    })
}

/// Years from every century expression in the text
pub fn extract_century_years(text: &str) -> Vec<i32> {
    let mut years = Vec::new();
    for (kind, regex) in CENTURY_PATTERNS.iter() {
        for caps in regex.captures_iter(text) {
            let (number, qualifier) = match kind {
                0 => (caps.get(2), qualifier_from(caps.get(1).map(|m| m.as_str()))),
                1 => (caps.get(1), CenturyQualifier::Mid),
                _ => (caps.get(1), qualifier_from(caps.get(2).map(|m| m.as_str()))),
            };
            let Some(century) = number.and_then(|m| m.as_str().parse::<i32>().ok()) else {
                continue;
            };
            if (1..=21).contains(&century) {
                years.push(century_to_year(century, qualifier));
            }
        }
    }
    years
}

/// Collapse a tier's years into one period
///
/// - a title year among the matches becomes the start year and suppresses multi-era handling
/// - a spread beyond the materiality gap is a multi-era work: no end year (unless a
///   literal range matched) and the remaining years become additional years
/// - otherwise the years form a plain `min..max` span
pub fn aggregate_years(years: &[i32], range: Option<(i32, i32)>, title_year: Option<i32>) -> Period {
    let distinct: BTreeSet<i32> = years.iter().copied().collect();
    let (Some(&min), Some(&max)) = (distinct.first(), distinct.last()) else {
        return Period::unknown();
    };

    if let Some(title_year) = title_year.filter(|y| distinct.contains(y)) {
        let end = (title_year != max).then_some(max);
        return Period::years(title_year, end, Vec::new());
    }

    if max - min > crate::models::MATERIALITY_GAP_YEARS {
        return match range {
            Some((start, end)) => {
                let rest = distinct
                    .iter()
                    .copied()
                    .filter(|y| *y != start && *y != end)
                    .collect();
                Period::years(start, Some(end), rest)
            }
            None => Period::years(min, None, distinct.iter().skip(1).copied().collect()),
        };
    }

    Period::years(min, (min != max).then_some(max), Vec::new())
}
