//! Data models

pub mod attribution;
pub mod subject;

pub use attribution::{
    format_period, AttributionEntry, AttributionSource, Confidence, Period, PeriodLabel,
    Reliability, UserOverride, MATERIALITY_GAP_YEARS,
};
pub use subject::{Genre, SubjectMetadata};
