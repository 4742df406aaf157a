//! Parsing of the fusion agent's JSON verdict.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Summary used when the fusion output can't be parsed.
pub const PARSE_ERROR_SUMMARY: &str = "Error parsing agent output";

/// Errors from [`Validation::parse`].
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("invalid JSON in model output: {0}")]
    Invalid(String),
}

/// Traffic-light verdict on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Green,
    Red,
    /// Thinking mode answered but not in the expected format.
    Yellow,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Green => "Green",
            Flag::Red => "Red",
            Flag::Yellow => "Yellow",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "green" => Some(Flag::Green),
            "red" => Some(Flag::Red),
            "yellow" => Some(Flag::Yellow),
            _ => None,
        }
    }

    /// Green at or above the threshold, Red below it.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score >= threshold {
            Flag::Green
        } else {
            Flag::Red
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Flag::Green => "🟢",
            Flag::Red => "🔴",
            Flag::Yellow => "🟡",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fusion verdict: `{confidence_score, summary, flag}`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<Flag>,
}

impl Validation {
    /// Parse model output into a verdict.
    ///
    /// Accepts bare JSON, JSON inside a code fence, or the first JSON object
    /// embedded in prose. `<think>` sections are ignored. Confidence is
    /// clamped to 0..1.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let cleaned = strip_think(raw);
        let obj = extract_json_object(&cleaned)?;

        let confidence_score = obj.get("confidence_score").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        });
        let summary = obj.get("summary").and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        let flag = obj
            .get("flag")
            .and_then(|v| v.as_str())
            .and_then(Flag::from_str);

        Ok(Self {
            confidence_score: confidence_score.map(|c| (c as f32).clamp(0.0, 1.0)),
            summary,
            flag,
        })
    }

    /// Verdict used when the fusion output isn't valid JSON.
    pub fn parse_error() -> Self {
        Self {
            confidence_score: None,
            summary: Some(PARSE_ERROR_SUMMARY.to_string()),
            flag: Some(Flag::Red),
        }
    }

    /// Verdict wrapping an unparseable thinking-mode answer.
    pub fn unstructured(raw: &str) -> Self {
        Self {
            confidence_score: None,
            summary: Some(raw.trim().to_string()),
            flag: Some(Flag::Yellow),
        }
    }
}

/// Remove `<think>...</think>` sections emitted by reasoning models.
fn strip_think(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// First `{...}` in `s` that parses as a JSON object. Braces in
/// surrounding prose are skipped.
fn extract_json_object(s: &str) -> Result<Map<String, Value>, ValidationError> {
    let mut last_error = None;
    for (start, _) in s.match_indices('{') {
        let Some(candidate) = balanced_object(&s[start..]) else {
            continue;
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(obj)) => return Ok(obj),
            Ok(_) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    Err(last_error.map_or(ValidationError::NoJson, ValidationError::Invalid))
}

/// The balanced `{...}` at the start of `s`, respecting string literals.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
