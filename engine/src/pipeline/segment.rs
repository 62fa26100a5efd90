//! Segmentation response parsing
//!
//! The model is asked for a JSON object but answers vary: bare JSON, JSON in
//! a fenced code block, or JSON surrounded by prose. Numbers arrive as
//! integers, floats or strings. The parser accepts all of these and rejects
//! anything that would leave a required target missing.

use crate::estimator::DEFAULT_TRAINING_FREQUENCY;
use crate::llm::{extract_balanced_json, extract_fenced_json, LLMError};
use crate::pipeline::prompts::PromptError;
use sdk::{ClientSegment, MacroRatio, SegmentSource};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_SEGMENT_LABEL: &str = "general";

/// Why a segmentation response could not be used
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentParseError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a non-negative integer: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("calorie_target must be greater than zero")]
    NonPositiveCalories,
}

/// Failure of a pipeline step before or during the remote call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Remote(#[from] LLMError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Result of the segmentation step
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationOutcome {
    /// The model answered with a usable segment
    Parsed(ClientSegment),
    /// The model answered, but the text could not be turned into a segment
    Unparsed {
        raw: String,
        reason: SegmentParseError,
    },
    /// No answer: prompt or remote call failed
    Failed(StepError),
}

/// Parse a segmentation response.
pub fn parse_segment(text: &str) -> Result<ClientSegment, SegmentParseError> {
    let object = locate_object(text)?;

    let segment = string_field(&object, "segment")
        .unwrap_or_else(|| DEFAULT_SEGMENT_LABEL.to_string());
    let calorie_target = required_u32(&object, "calorie_target")?;
    if calorie_target == 0 {
        return Err(SegmentParseError::NonPositiveCalories);
    }
    let protein_grams = required_u32(&object, "protein_grams")?;
    let carbs_grams = required_u32(&object, "carbs_grams")?;
    let fat_grams = required_u32(&object, "fat_grams")?;

    let macro_ratio = object
        .get("macro_ratio")
        .and_then(parse_macro_ratio)
        .unwrap_or_default();
    let training_frequency = string_field(&object, "training_frequency")
        .unwrap_or_else(|| DEFAULT_TRAINING_FREQUENCY.to_string());
    let reasoning = string_field(&object, "reasoning").unwrap_or_default();

    Ok(ClientSegment {
        segment,
        calorie_target,
        protein_grams,
        carbs_grams,
        fat_grams,
        macro_ratio,
        training_frequency,
        reasoning,
        source: SegmentSource::Model,
    })
}

/// Find the JSON object in the response: the whole text, then a fenced
/// block, then the first balanced `{...}`.
fn locate_object(text: &str) -> Result<Map<String, Value>, SegmentParseError> {
    let trimmed = text.trim();
    let mut last_error = None;

    let candidates = [
        Some(trimmed),
        extract_fenced_json(trimmed),
        extract_balanced_json(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => last_error = Some(SegmentParseError::InvalidJson("not an object".into())),
            Err(e) => last_error = Some(SegmentParseError::InvalidJson(e.to_string())),
        }
    }

    // Nothing brace-shaped at all is a different failure from broken JSON
    if !trimmed.contains('{') {
        return Err(SegmentParseError::NoJson);
    }
    Err(last_error.unwrap_or(SegmentParseError::NoJson))
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_u32(object: &Map<String, Value>, field: &'static str) -> Result<u32, SegmentParseError> {
    let value = object
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or(SegmentParseError::MissingField(field))?;
    coerce_u32(value).ok_or_else(|| SegmentParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Integers, finite non-negative floats (truncated) and numeric strings
pub fn coerce_u32(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).ok();
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !number.is_finite() || number < 0.0 || number > f64::from(u32::MAX) {
        return None;
    }
    Some(number.trunc() as u32)
}

fn parse_macro_ratio(value: &Value) -> Option<MacroRatio> {
    let object = value.as_object()?;
    Some(MacroRatio {
        protein: coerce_u32(object.get("protein")?)?,
        carbs: coerce_u32(object.get("carbs")?)?,
        fat: coerce_u32(object.get("fat")?)?,
    })
}
