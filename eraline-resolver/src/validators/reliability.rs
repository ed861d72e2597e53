//! Reliability grading
//!
//! An ordered rule table; the first rule whose condition holds assigns the
//! grade. The default table encodes the genre judgment calls (absent period
//! is expected for fantasy, suspicious for science fiction), and callers may
//! supply their own table.

use crate::models::{AttributionSource, Confidence, Genre, Period, PeriodLabel, Reliability};

/// What the resolving tier (or the last failing one) produced
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub period: Period,
    pub source: AttributionSource,
    /// Confidence reported by the last tier that answered cleanly
    pub confidence: Option<Confidence>,
    /// Last attempted inference provider was rate limited or errored
    pub last_call_failed: bool,
    /// Reference tier source when it ran without resolving
    pub reference: Option<AttributionSource>,
}

impl ResolutionOutcome {
    pub fn resolved(period: Period, source: AttributionSource, confidence: Confidence) -> Self {
        Self {
            period,
            source,
            confidence: Some(confidence),
            last_call_failed: false,
            reference: None,
        }
    }

    fn has_year(&self) -> bool {
        self.period.start_year.is_some()
    }
}

/// Rule condition; all but `UserSupplied` and `YearFound` only apply when no year was found
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    UserSupplied,
    YearFound,
    /// Genre intersects `genres` and the label is one of `labels`
    ExpectedTimeless {
        genres: Vec<Genre>,
        labels: Vec<PeriodLabel>,
    },
    /// Genre intersects `genres`
    GenreWithoutYear(Vec<Genre>),
    LastCallFailed,
    ConfidenceAtMost(Confidence),
    /// Reference lookup found no article or no temporal phrase
    ReferenceMissed,
    /// Reference lookup errored or timed out
    ReferenceFailed,
    Always,
}

impl Condition {
    fn holds(&self, outcome: &ResolutionOutcome, genres: &[Genre]) -> bool {
        let any_genre = |wanted: &[Genre]| wanted.iter().any(|g| genres.contains(g));
        match self {
            Condition::UserSupplied => outcome.source == AttributionSource::UserSupplied,
            Condition::YearFound => outcome.has_year(),
            Condition::Always => true,
            _ if outcome.has_year() => false,
            Condition::ExpectedTimeless { genres: wanted, labels } => {
                any_genre(wanted) && labels.contains(&outcome.period.label)
            }
            Condition::GenreWithoutYear(wanted) => any_genre(wanted),
            Condition::LastCallFailed => outcome.last_call_failed,
            Condition::ConfidenceAtMost(limit) => {
                outcome.confidence.map(|c| c <= *limit).unwrap_or(false)
            }
            Condition::ReferenceMissed => outcome
                .reference
                .as_ref()
                .is_some_and(AttributionSource::is_reference_miss),
            Condition::ReferenceFailed => outcome
                .reference
                .as_ref()
                .is_some_and(AttributionSource::is_failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRule {
    pub name: &'static str,
    pub condition: Condition,
    pub grade: Reliability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityPolicy {
    rules: Vec<PolicyRule>,
}

impl Default for ReliabilityPolicy {
    fn default() -> Self {
        Self::with_rules(vec![
            PolicyRule {
                name: "user_supplied",
                condition: Condition::UserSupplied,
                grade: Reliability::Verified,
            },
            PolicyRule {
                name: "year_found",
                condition: Condition::YearFound,
                grade: Reliability::High,
            },
            PolicyRule {
                name: "timeless_genre",
                condition: Condition::ExpectedTimeless {
                    genres: vec![Genre::Fantasy, Genre::Animation, Genre::Family],
                    labels: vec![PeriodLabel::NoPeriod, PeriodLabel::LongAgo],
                },
                grade: Reliability::High,
            },
            PolicyRule {
                name: "science_fiction_without_year",
                condition: Condition::GenreWithoutYear(vec![Genre::ScienceFiction]),
                grade: Reliability::Low,
            },
            PolicyRule {
                name: "last_call_failed",
                condition: Condition::LastCallFailed,
                grade: Reliability::Low,
            },
            PolicyRule {
                name: "reference_failed",
                condition: Condition::ReferenceFailed,
                grade: Reliability::Low,
            },
            PolicyRule {
                name: "low_confidence",
                condition: Condition::ConfidenceAtMost(Confidence::Low),
                grade: Reliability::Low,
            },
            PolicyRule {
                name: "reference_missed",
                condition: Condition::ReferenceMissed,
                grade: Reliability::Low,
            },
            PolicyRule {
                name: "fallback",
                condition: Condition::Always,
                grade: Reliability::High,
            },
        ])
    }
}

impl ReliabilityPolicy {
    pub fn with_rules(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Grade an outcome; `(grade, rule name)`
    ///
    /// A table with no matching rule grades `Low`.
    pub fn grade(&self, outcome: &ResolutionOutcome, genres: &[Genre]) -> (Reliability, &'static str) {
        self.rules
            .iter()
            .find(|rule| rule.condition.holds(outcome, genres))
            .map(|rule| (rule.grade, rule.name))
            .unwrap_or((Reliability::Low, "no_rule"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_year(label: PeriodLabel, source: AttributionSource) -> ResolutionOutcome {
        ResolutionOutcome::resolved(Period::sentinel(label), source, Confidence::High)
    }

    fn grade(outcome: &ResolutionOutcome, genres: &[Genre]) -> Reliability {
        ReliabilityPolicy::default().grade(outcome, genres).0
    }

    #[test]
    fn test_year_found_is_high() {
        let outcome = ResolutionOutcome::resolved(
            Period::years(1944, None, vec![]),
            AttributionSource::Inference("groq".to_string()),
            Confidence::Low,
        );
        assert_eq!(grade(&outcome, &[Genre::ScienceFiction]), Reliability::High);
    }

    #[test]
    fn test_user_supplied_is_verified() {
        let outcome = no_year(PeriodLabel::NoPeriod, AttributionSource::UserSupplied);
        assert_eq!(grade(&outcome, &[]), Reliability::Verified);
    }

    #[test]
    fn test_fantasy_no_period_is_high() {
        let outcome = no_year(PeriodLabel::NoPeriod, AttributionSource::Pattern);
        assert_eq!(grade(&outcome, &[Genre::Fantasy]), Reliability::High);
        assert_eq!(grade(&outcome, &[Genre::Animation, Genre::ScienceFiction]), Reliability::High);
    }

    #[test]
    fn test_science_fiction_without_year_is_low() {
        let outcome = no_year(PeriodLabel::LongAgo, AttributionSource::Pattern);
        let (grade, rule) = ReliabilityPolicy::default().grade(&outcome, &[Genre::ScienceFiction]);
        assert_eq!(grade, Reliability::Low);
        assert_eq!(rule, "science_fiction_without_year");
    }

    #[test]
    fn test_failed_last_provider_is_low() {
        let outcome = ResolutionOutcome {
            period: Period::unknown(),
            source: AttributionSource::InferenceRateLimited("groq".to_string()),
            confidence: None,
            last_call_failed: true,
            reference: None,
        };
        assert_eq!(grade(&outcome, &[Genre::Drama]), Reliability::Low);
    }

    #[test]
    fn test_low_confidence_and_reference_miss_are_low() {
        let mut outcome = ResolutionOutcome::resolved(
            Period::unknown(),
            AttributionSource::Inference("gemini".to_string()),
            Confidence::Low,
        );
        assert_eq!(grade(&outcome, &[Genre::Drama]), Reliability::Low);

        outcome.confidence = Some(Confidence::Medium);
        outcome.reference = Some(AttributionSource::ReferenceNoPeriod);
        assert_eq!(grade(&outcome, &[Genre::Drama]), Reliability::Low);
    }

    #[test]
    fn test_reference_error_keeps_clean_unknown_retryable() {
        let mut outcome = ResolutionOutcome::resolved(
            Period::unknown(),
            AttributionSource::Inference("deepseek".to_string()),
            Confidence::High,
        );
        assert_eq!(grade(&outcome, &[Genre::Drama]), Reliability::High);

        outcome.reference = Some(AttributionSource::ReferenceError);
        let (grade, rule) = ReliabilityPolicy::default().grade(&outcome, &[Genre::Drama]);
        assert_eq!(grade, Reliability::Low);
        assert_eq!(rule, "reference_failed");
    }

    #[test]
    fn test_clean_sentinel_otherwise_high() {
        let outcome = no_year(PeriodLabel::NearFuture, AttributionSource::Inference("deepseek".to_string()));
        assert_eq!(grade(&outcome, &[Genre::Drama]), Reliability::High);
    }

    #[test]
    fn test_custom_table() {
        let policy = ReliabilityPolicy::with_rules(vec![PolicyRule {
            name: "strict",
            condition: Condition::YearFound,
            grade: Reliability::Medium,
        }]);
        let with_year = ResolutionOutcome::resolved(
            Period::years(1863, None, vec![]),
            AttributionSource::Keyword,
            Confidence::Medium,
        );
        assert_eq!(policy.grade(&with_year, &[]), (Reliability::Medium, "strict"));
        assert_eq!(
            policy.grade(&no_year(PeriodLabel::NoPeriod, AttributionSource::Pattern), &[]),
            (Reliability::Low, "no_rule")
        );
    }
}
