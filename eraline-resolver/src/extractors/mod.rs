//! Text extraction: year patterns, curated keywords and the pattern tier

pub mod keywords;
pub mod pattern_extractor;
pub mod patterns;

pub use pattern_extractor::{Extraction, PatternExtractor};
pub use patterns::{extract_direct, DirectMatch, DirectOptions, DirectTier};
