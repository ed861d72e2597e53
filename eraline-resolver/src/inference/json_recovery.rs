//! Answer recovery from free-text provider output
//!
//! Providers are asked for a single JSON object but routinely wrap it in a
//! Markdown fence or put reasoning before it. Recovery order:
//!
//! 1. strip a code fence if one is present
//! 2. parse the remaining text as a whole
//! 3. scan balanced `{...}` blocks, last block first, and take the first one
//!    that parses and carries `confidence` plus `startYear` (or a sentinel `period`)

use crate::models::{Confidence, Period, PeriodLabel};
use serde_json::{Map, Value};

/// Structured answer recovered from a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredAnswer {
    pub period: Period,
    pub confidence: Confidence,
}

/// Contents of the first fenced block, or the trimmed text when there is none
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[open + 3..];
    // Skip the info string ("json", "JSON", ...) up to the end of that line
    let body_start = match after_fence.find('\n') {
        Some(newline) if after_fence[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            newline + 1
        }
        _ => 0,
    };
    let body = &after_fence[body_start..];

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Top-level balanced `{...}` blocks in order of appearance
///
/// Braces inside JSON string literals (including escaped quotes) are ignored.
pub fn balanced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        blocks.push(&text[begin..=idx]);
                    }
                }
            }
            _ => {}
        }
    }

    blocks
}

fn sentinel_label(value: &str) -> Option<PeriodLabel> {
    let label = match value.trim() {
        "近未来" => PeriodLabel::NearFuture,
        other => PeriodLabel::parse(&other.to_ascii_uppercase()),
    };
    label.is_sentinel().then_some(label)
}

fn year_value(value: Option<&Value>) -> Option<i32> {
    let year = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    // 0 is how providers spell "no year" next to a sentinel
    i32::try_from(year).ok().filter(|y| *y != 0)
}

fn has_required_fields(object: &Map<String, Value>) -> bool {
    if !object.contains_key("confidence") {
        return false;
    }
    object.contains_key("startYear")
        || object
            .get("period")
            .and_then(Value::as_str)
            .and_then(sentinel_label)
            .is_some()
}

fn answer_from_object(object: &Map<String, Value>) -> RecoveredAnswer {
    let confidence = object
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(Confidence::parse)
        .unwrap_or(Confidence::Medium);

    let period = match year_value(object.get("startYear")) {
        Some(start_year) => {
            let additional = object
                .get("additionalYears")
                .and_then(Value::as_array)
                .map(|years| years.iter().filter_map(|y| year_value(Some(y))).collect())
                .unwrap_or_default();
            Period::years(start_year, year_value(object.get("endYear")), additional)
        }
        None => object
            .get("period")
            .and_then(Value::as_str)
            .and_then(sentinel_label)
            .map(Period::sentinel)
            .unwrap_or_else(Period::unknown),
    };

    RecoveredAnswer { period, confidence }
}

fn parse_candidate(candidate: &str) -> Option<RecoveredAnswer> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    has_required_fields(object).then(|| answer_from_object(object))
}

/// Recover the structured answer from raw provider text
///
/// Returns `None` when no candidate block parses with the required fields.
pub fn recover_answer(text: &str) -> Option<RecoveredAnswer> {
    let body = strip_code_fences(text);
    if let Some(answer) = parse_candidate(body) {
        return Some(answer);
    }

    balanced_blocks(body)
        .into_iter()
        .rev()
        .find_map(parse_candidate)
        .or_else(|| {
            // Fence stripping may have cut the answer off; rescan everything
            (body.len() != text.trim().len())
                .then(|| balanced_blocks(text).into_iter().rev().find_map(parse_candidate))
                .flatten()
        })
}
