//! # pdf-takeoff
//!
//! Extract construction takeoff data (equipment, fixtures, materials and
//! their quantities) from PDF drawing sets and specifications using an LLM.
//!
//! ## Why this crate?
//!
//! Models asked for JSON do not reliably return JSON. Answers arrive wrapped
//! in markdown fences, with chatter around the object, with unescaped quotes
//! inside values, or cut off mid-string when the output token budget runs
//! out. This crate sends one request and then works hard to salvage what
//! came back: a chain of progressively more aggressive repairs ends in a
//! fixed placeholder result, so a parse failure is never a crash. Whatever
//! survives is checked against the expected shape before it is returned.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL (size + magic check)
//!  ├─ 2. Text       pdfium text layer, all pages (spawn_blocking)
//!  ├─ 3. Normalise  strip control chars, collapse whitespace, cap length
//!  ├─ 4. LLM        one call to Claude or Gemini
//!  ├─ 5. Recover    direct → object span → escape repair → truncation repair → placeholder
//!  └─ 6. Validate   shape check, typed ExtractionResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_takeoff::{extract, ExtractionConfig, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ANTHROPIC_API_KEY
//!     let config = ExtractionConfig::builder()
//!         .provider(Provider::Claude)
//!         .build()?;
//!     let output = extract("mechanical-schedule.pdf", &config).await?;
//!     println!("{}", output.result.to_markdown());
//!     eprintln!("parsed via {}", output.stats.strategy);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `takeoff` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-takeoff = { version = "0.1", default-features = false }
//! ```
//!
//! ## Providers
//!
//! | Provider | Default model | API key |
//! |----------|---------------|---------|
//! | Claude   | `claude-3-5-sonnet-20241022` | `ANTHROPIC_API_KEY` |
//! | Gemini   | `gemini-1.5-flash-latest`    | `GEMINI_API_KEY` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ShapeError, TakeoffError};
pub use extract::{
    analyze_text, extract, extract_document_text, extract_from_bytes, extract_sync,
    extract_to_file, inspect, interpret_answer, write_atomic,
};
pub use output::{
    DocumentMetadata, DocumentText, ExtractedItem, ExtractionOutput, ExtractionResult,
    ExtractionStats, NOT_FOUND,
};
pub use pipeline::normalize::{normalize_text, truncate_text, TRUNCATION_MARKER};
pub use pipeline::recover::{recover, ParseStrategy, Recovered};
pub use pipeline::validate::validate;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::Provider;
pub use store::{FileTextStore, MemoryTextStore, StoredText, TextStore};
