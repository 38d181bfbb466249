//! Error types for the pdf-takeoff library.
//!
//! Every failure that reaches a caller is a [`TakeoffError`]. The one thing
//! that is deliberately *not* an error is a malformed model reply: the
//! recovery pipeline in [`crate::pipeline::recover`] always produces some
//! JSON object, and only a failed shape check afterwards
//! ([`TakeoffError::ValidationFailed`]) turns a bad reply into an error.
//!
//! [`ShapeError`] is the pure result of that shape check. It names the first
//! offending field so the message is actionable.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf-takeoff library.
#[derive(Debug, Error)]
pub enum TakeoffError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF is larger than the configured limit.
    #[error("PDF '{path}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// No document text to analyse. Rejected before any network call.
    #[error("No text available for analysis. Extract text from a PDF first.")]
    EmptyText,

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not read the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
(a file or the directory containing it).\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Provider rejected the credentials (401/403): retry will not help.
    #[error("Authentication error from {provider}: {detail}\nCheck {env_var}.")]
    AuthError {
        provider: String,
        env_var: String,
        detail: String,
    },

    /// The requested model does not exist or is not available to this key.
    #[error("The {provider} model '{model}' was not found or is not accessible. Details: {detail}")]
    ModelNotFound {
        provider: String,
        model: String,
        detail: String,
    },

    /// Provider returned HTTP 429 or reported an exhausted quota.
    #[error("{provider} rate limit exceeded or quota exhausted. Please try again later. Details: {detail}")]
    RateLimitExceeded { provider: String, detail: String },

    /// Provider is temporarily overloaded (HTTP 503 / "overloaded").
    #[error("{provider} is temporarily overloaded. Please try again in a moment. Details: {detail}")]
    ProviderOverloaded { provider: String, detail: String },

    /// Any other failure of the outbound call.
    #[error("{provider} API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    LlmApiError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The outbound call did not finish within the configured timeout.
    #[error("{provider} API call timed out after {secs}s")]
    ApiTimeout { provider: String, secs: u64 },

    /// The provider answered with an empty body.
    #[error("No answer received from {provider}")]
    EmptyAnswer { provider: String },

    // ── Validation errors ─────────────────────────────────────────────────
    /// The recovered JSON object does not have the ExtractionResult shape.
    #[error("Generated construction data from {provider} failed validation: {detail}. Please try again.")]
    ValidationFailed { provider: String, detail: ShapeError },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The stored-text file could not be written or removed.
    #[error("Text store error at '{path}': {detail}")]
    StoreFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TakeoffError {
    /// Display name of the provider involved, for errors raised by an LLM call.
    pub fn provider(&self) -> Option<&str> {
        match self {
            TakeoffError::ProviderNotConfigured { provider, .. }
            | TakeoffError::AuthError { provider, .. }
            | TakeoffError::ModelNotFound { provider, .. }
            | TakeoffError::RateLimitExceeded { provider, .. }
            | TakeoffError::ProviderOverloaded { provider, .. }
            | TakeoffError::LlmApiError { provider, .. }
            | TakeoffError::ApiTimeout { provider, .. }
            | TakeoffError::EmptyAnswer { provider }
            | TakeoffError::ValidationFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Why a JSON value is not a valid ExtractionResult.
///
/// `path` uses the serialised (camelCase) field names, with `[i]` for array
/// elements, e.g. `extractedItems[2].quantity`. An empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_shape(.path, .expected, .missing))]
pub struct ShapeError {
    pub path: String,
    pub expected: &'static str,
    pub missing: bool,
}

fn describe_shape(path: &str, expected: &str, missing: &bool) -> String {
    let target = if path.is_empty() { "response" } else { path };
    if *missing {
        format!("missing field `{target}` ({expected})")
    } else {
        format!("`{target}` must be {expected}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failed_names_provider() {
        let e = TakeoffError::ValidationFailed {
            provider: "Gemini".into(),
            detail: ShapeError {
                path: "documentType".into(),
                expected: "a string",
                missing: true,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Gemini"), "got: {msg}");
        assert!(msg.contains("failed validation"), "got: {msg}");
        assert!(msg.contains("documentType"), "got: {msg}");
        assert_eq!(e.provider(), Some("Gemini"));
    }

    #[test]
    fn api_error_display_with_status() {
        let e = TakeoffError::LlmApiError {
            provider: "Claude".into(),
            status: Some(500),
            message: "internal".into(),
        };
        assert_eq!(e.to_string(), "Claude API error (500): internal");
    }

    #[test]
    fn api_error_display_without_status() {
        let e = TakeoffError::LlmApiError {
            provider: "Claude".into(),
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(e.to_string(), "Claude API error: connection reset");
    }

    #[test]
    fn rate_limit_display() {
        let e = TakeoffError::RateLimitExceeded {
            provider: "Gemini".into(),
            detail: "RESOURCE_EXHAUSTED".into(),
        };
        assert!(e.to_string().contains("Gemini"));
        assert!(e.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn auth_error_mentions_env_var() {
        let e = TakeoffError::AuthError {
            provider: "Claude".into(),
            env_var: "ANTHROPIC_API_KEY".into(),
            detail: "invalid x-api-key".into(),
        };
        assert!(e.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn input_errors_have_no_provider() {
        assert_eq!(TakeoffError::EmptyText.provider(), None);
        let e = TakeoffError::FileTooLarge {
            path: "big.pdf".into(),
            size: 20,
            limit: 10,
        };
        assert_eq!(e.provider(), None);
        assert!(e.to_string().contains("limit is 10"));
    }

    #[test]
    fn shape_error_display() {
        let missing = ShapeError {
            path: "summary".into(),
            expected: "a string",
            missing: true,
        };
        assert_eq!(missing.to_string(), "missing field `summary` (a string)");

        let wrong = ShapeError {
            path: "extractedItems[1].quantity".into(),
            expected: "a string",
            missing: false,
        };
        assert_eq!(
            wrong.to_string(),
            "`extractedItems[1].quantity` must be a string"
        );

        let root = ShapeError {
            path: String::new(),
            expected: "a JSON object",
            missing: false,
        };
        assert_eq!(root.to_string(), "`response` must be a JSON object");
    }
}
