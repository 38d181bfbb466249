//! Response recovery: coerce a model's free-text answer into a JSON object.
//!
//! Models asked for "only JSON" still wrap it in code fences, prepend a
//! sentence of prose, leave quotes unescaped inside values, or run out of
//! output tokens halfway through the item list. [`recover`] tries a fixed
//! chain of increasingly aggressive strategies and takes the first one that
//! yields a JSON object:
//!
//! ```text
//! clean ──▶ direct ──▶ object span ──▶ escape repair ──▶ truncation repair ──▶ sentinel
//! ```
//!
//! The chain never fails. When nothing parses, the sentinel is a fixed
//! "parse failed" result that passes validation. Whether the object has the
//! ExtractionResult shape is decided afterwards by
//! [`crate::pipeline::validate`].
//!
//! Truncation repair is best-effort: closing a dangling string and balancing
//! braces can produce an object whose last item is cut short. That object is
//! accepted as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// The strategy that produced a recovered value, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// The cleaned text parsed as-is.
    Direct,
    /// The span from the first `{` to the last `}` parsed.
    ObjectSpan,
    /// Parsed after control characters and embedded quotes were re-escaped.
    EscapeRepair,
    /// Parsed after closing a dangling string and unmatched braces.
    TruncationRepair,
    /// Nothing parsed; the fixed failure result was used.
    Sentinel,
}

impl ParseStrategy {
    /// All strategies in the order they are tried.
    pub const CHAIN: [ParseStrategy; 5] = [
        ParseStrategy::Direct,
        ParseStrategy::ObjectSpan,
        ParseStrategy::EscapeRepair,
        ParseStrategy::TruncationRepair,
        ParseStrategy::Sentinel,
    ];

    /// 1-based position in [`Self::CHAIN`].
    pub fn attempt_number(self) -> usize {
        match self {
            ParseStrategy::Direct => 1,
            ParseStrategy::ObjectSpan => 2,
            ParseStrategy::EscapeRepair => 3,
            ParseStrategy::TruncationRepair => 4,
            ParseStrategy::Sentinel => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParseStrategy::Direct => "direct parse",
            ParseStrategy::ObjectSpan => "object extraction",
            ParseStrategy::EscapeRepair => "escaping repair",
            ParseStrategy::TruncationRepair => "truncation repair",
            ParseStrategy::Sentinel => "parse-failure placeholder",
        }
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A JSON object recovered from a model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    /// Always a JSON object.
    pub value: Value,
    pub strategy: ParseStrategy,
}

impl Recovered {
    /// `true` when anything other than a direct parse was needed.
    pub fn used_fallback(&self) -> bool {
        self.strategy != ParseStrategy::Direct
    }
}

/// Why a single strategy did not produce an object. Diagnostic only.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parsed a JSON {0}, expected an object")]
    NotAnObject(&'static str),
    #[error("no {{ ... }} span found")]
    NoObjectSpan,
    #[error("nothing to repair")]
    NothingToRepair,
}

type Attempt = fn(&str) -> Result<Value, AttemptError>;

/// Recover a JSON object from `raw`. Never fails.
///
/// `provider_name` only appears in log lines and in the sentinel's text.
pub fn recover(raw: &str, provider_name: &str) -> Recovered {
    let cleaned = clean_response(raw);

    let attempts: [(ParseStrategy, Attempt); 4] = [
        (ParseStrategy::Direct, parse_object),
        (ParseStrategy::ObjectSpan, parse_object_span),
        (ParseStrategy::EscapeRepair, parse_escape_repaired),
        (ParseStrategy::TruncationRepair, parse_truncation_repaired),
    ];

    for (strategy, attempt) in attempts {
        match attempt(&cleaned) {
            Ok(value) => {
                if strategy != ParseStrategy::Direct {
                    warn!(
                        "{} JSON parsed using fallback strategy {} ({})",
                        provider_name,
                        strategy.attempt_number(),
                        strategy
                    );
                }
                return Recovered { value, strategy };
            }
            Err(e) => {
                warn!(
                    "{} parse attempt {} ({}) failed: {}",
                    provider_name,
                    strategy.attempt_number(),
                    strategy,
                    e
                );
            }
        }
    }

    warn!(
        "{} response could not be parsed ({} chars); using placeholder result",
        provider_name,
        raw.len()
    );
    Recovered {
        value: parse_failure_value(provider_name),
        strategy: ParseStrategy::Sentinel,
    }
}

/// The fixed result used when no strategy parses.
pub fn parse_failure_value(provider_name: &str) -> Value {
    json!({
        "summary": format!(
            "Failed to parse complete {provider_name} response. Please try again with a different document."
        ),
        "totalItemsFound": 0,
        "documentType": "Unknown",
        "extractedItems": [],
        "recommendations": [
            format!("Unable to parse {provider_name} response - please try again"),
            "Consider using a different PDF with clearer text",
            "Check if document contains structured construction data",
        ],
    })
}

// ── Pre-processing ───────────────────────────────────────────────────────────

/// A fence marker alone on its line, optionally tagged (`json`, `JSON`).
static RE_FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*$").unwrap());

/// An inline fence opening the answer, e.g. "```json {".
static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A```[A-Za-z0-9_+-]*").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*\z").unwrap());

/// Strip code-fence markers and blank lines, then trim.
///
/// Only fences at the very start or end of the answer, or alone on a line,
/// are removed. Backticks inside string values are left alone.
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = RE_LEADING_FENCE.replace(trimmed, "");
    let unfenced = RE_TRAILING_FENCE.replace(&unfenced, "");
    unfenced
        .lines()
        .filter(|line| !line.trim().is_empty() && !RE_FENCE_LINE.is_match(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── Strategy 1: direct ───────────────────────────────────────────────────────

fn parse_object(text: &str) -> Result<Value, AttemptError> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(_) => Err(AttemptError::NotAnObject("array")),
        Value::String(_) => Err(AttemptError::NotAnObject("string")),
        Value::Number(_) => Err(AttemptError::NotAnObject("number")),
        Value::Bool(_) => Err(AttemptError::NotAnObject("boolean")),
        Value::Null => Err(AttemptError::NotAnObject("null")),
    }
}

// ── Strategy 2: first `{` to last `}` ────────────────────────────────────────

fn parse_object_span(text: &str) -> Result<Value, AttemptError> {
    let span = object_span(text).ok_or(AttemptError::NoObjectSpan)?;
    parse_object(span)
}

fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Strategy 3: escaping repair ──────────────────────────────────────────────

fn parse_escape_repaired(text: &str) -> Result<Value, AttemptError> {
    let repaired = repair_escaping(text);
    if repaired == text {
        return Err(AttemptError::NothingToRepair);
    }
    parse_object(&repaired)
}

/// Re-escape string contents consistently.
///
/// Inside string literals, already-escaped quotes are collapsed to plain
/// quotes and then every quote that does not end the literal is escaped
/// again. A quote ends the literal when the next non-whitespace character is
/// `,` `:` `}` `]` or the end of input. Raw newlines, tabs and carriage
/// returns become escapes, other control characters and invalid escapes are
/// dropped or doubled. Outside literals, control characters other than JSON
/// whitespace are dropped.
fn repair_escaping(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            if c == '"' {
                in_string = true;
                out.push(c);
            } else if !c.is_control() || matches!(c, '\n' | '\t' | '\r') {
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => match chars.get(i + 1).copied() {
                // Collapsed here, re-escaped as an embedded quote.
                Some('"') => {
                    out.push_str("\\\"");
                    i += 2;
                }
                Some(n @ ('\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                    out.push('\\');
                    out.push(n);
                    i += 2;
                }
                Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                    out.extend(&chars[i..i + 6]);
                    i += 6;
                }
                Some(_) => {
                    out.push_str("\\\\");
                    i += 1;
                }
                None => i += 1,
            },
            '"' => {
                if closes_string(&chars[i + 1..]) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
                i += 1;
            }
            '\n' => {
                out.push_str("\\n");
                i += 1;
            }
            '\t' => {
                out.push_str("\\t");
                i += 1;
            }
            '\r' => {
                out.push_str("\\r");
                i += 1;
            }
            c if c.is_control() => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}

fn closes_string(rest: &[char]) -> bool {
    match rest.iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ',' | ':' | '}' | ']'),
    }
}

// ── Strategy 4: truncation repair ────────────────────────────────────────────

fn parse_truncation_repaired(text: &str) -> Result<Value, AttemptError> {
    let repaired = repair_truncation(text).ok_or(AttemptError::NothingToRepair)?;
    parse_object(&repaired)
}

/// Close a dangling string literal, then append one `}` per unmatched `{`.
///
/// Returns `None` when neither applies.
fn repair_truncation(text: &str) -> Option<String> {
    let scan = scan_structure(text);
    let unmatched = scan.open_braces.saturating_sub(scan.close_braces);
    if !scan.in_string && unmatched == 0 {
        return None;
    }

    let mut repaired = text.to_string();
    if scan.in_string {
        if scan.dangling_escape {
            repaired.pop();
        }
        repaired.push('"');
    }
    repaired.push_str(&"}".repeat(unmatched));
    Some(repaired)
}

#[derive(Debug, Default)]
struct StructureScan {
    in_string: bool,
    /// Input ended right after a backslash inside a string.
    dangling_escape: bool,
    open_braces: usize,
    close_braces: usize,
}

/// Count braces outside string literals and report whether the input ends
/// inside one.
fn scan_structure(text: &str) -> StructureScan {
    let mut scan = StructureScan::default();
    let mut escaped = false;

    for c in text.chars() {
        if scan.in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                scan.in_string = false;
            }
            continue;
        }
        match c {
            '"' => scan.in_string = true,
            '{' => scan.open_braces += 1,
            '}' => scan.close_braces += 1,
            _ => {}
        }
    }

    scan.dangling_escape = scan.in_string && escaped;
    scan
}
