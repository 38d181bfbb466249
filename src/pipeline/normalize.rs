//! Pre-submission cleanup of document text.
//!
//! PDF text layers are noisy: form feeds between pages, stray control bytes,
//! typographic quotes, runs of padding spaces from table layouts. None of it
//! helps the model and all of it costs tokens. [`normalize_text`] strips that
//! noise and [`truncate_text`] bounds the request size.
//!
//! [`normalize_text`] is idempotent: running it on its own output changes
//! nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default character budget for document text embedded in a prompt.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;

/// Appended to text cut at the character budget.
pub const TRUNCATION_MARKER: &str = "\n[Text truncated for processing]";

/// Normalise extracted document text before it is embedded in a prompt.
///
/// Rules (applied in order):
/// 1. CRLF and lone CR become LF
/// 2. Control characters other than LF and TAB become one space
/// 3. Curly quotes become a straight double quote
/// 4. Three or more line breaks (blank lines may hold only spaces/tabs)
///    collapse to one blank line
/// 5. Runs of three or more spaces/tabs collapse to one space
/// 6. Leading and trailing whitespace is trimmed
pub fn normalize_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = replace_control_chars(&s);
    let s = straighten_quotes(&s);
    let s = collapse_blank_lines(&s);
    let s = collapse_spaces(&s);
    s.trim().to_string()
}

/// Text after applying the character budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    pub text: String,
    /// `true` when the input exceeded the budget and [`TRUNCATION_MARKER`]
    /// was appended.
    pub truncated: bool,
}

/// Cut `text` to at most `max_chars` characters (Unicode scalar values).
///
/// Text of exactly `max_chars` characters is returned unchanged.
pub fn truncate_text(text: &str, max_chars: usize) -> Truncated {
    match text.char_indices().nth(max_chars) {
        None => Truncated {
            text: text.to_string(),
            truncated: false,
        },
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            Truncated {
                text: out,
                truncated: true,
            }
        }
    }
}

// ── Rule 1: line endings ─────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: control characters ───────────────────────────────────────────────

fn replace_control_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_control() && c != '\n' && c != '\t' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

// ── Rule 3: typographic quotes ───────────────────────────────────────────────

fn straighten_quotes(input: &str) -> String {
    input.replace(['\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'], "\"")
}

// ── Rule 4: blank lines ──────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 5: space runs ───────────────────────────────────────────────────────

static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{3,}").unwrap());

fn collapse_spaces(input: &str) -> String {
    RE_SPACE_RUNS.replace_all(input, " ").into_owned()
}
