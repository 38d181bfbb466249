//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to hear
//! about each stage of a request as it happens. The CLI uses this to drive
//! its spinner; a server could forward the same events over a channel.
//!
//! # Example
//!
//! ```rust
//! use pdf_takeoff::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_complete(&self, items: usize) {
//!         eprintln!("{items} items found");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::recover::ParseStrategy;
use std::sync::Arc;

/// Called by the extraction pipeline as a request moves through its stages.
///
/// All methods have no-op defaults so implementations only override what
/// they need.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Text has been pulled out of a PDF.
    ///
    /// # Arguments
    /// * `file_name`: display name of the document
    /// * `page_count`: pages in the document
    /// * `chars`: characters of raw text extracted
    fn on_text_extracted(&self, file_name: &str, page_count: usize, chars: usize) {
        let _ = (file_name, page_count, chars);
    }

    /// The prompt is about to be sent.
    ///
    /// # Arguments
    /// * `provider`: provider display name
    /// * `submitted_chars`: characters of document text in the prompt
    fn on_request_start(&self, provider: &str, submitted_chars: usize) {
        let _ = (provider, submitted_chars);
    }

    /// The provider answered.
    fn on_response(&self, provider: &str, response_chars: usize) {
        let _ = (provider, response_chars);
    }

    /// The answer only parsed after a fallback strategy (or not at all,
    /// in which case `strategy` is [`ParseStrategy::Sentinel`]).
    fn on_fallback(&self, strategy: ParseStrategy) {
        let _ = strategy;
    }

    /// The request succeeded with `items` extracted items.
    fn on_complete(&self, items: usize) {
        let _ = items;
    }

    /// The request failed; `error` is the user-facing message.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, e: String) {
            self.events.lock().unwrap().push(e);
        }
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_text_extracted(&self, file_name: &str, page_count: usize, chars: usize) {
            self.push(format!("text {file_name} {page_count} {chars}"));
        }

        fn on_fallback(&self, strategy: ParseStrategy) {
            self.push(format!("fallback {strategy}"));
        }

        fn on_complete(&self, items: usize) {
            self.push(format!("complete {items}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_text_extracted("a.pdf", 3, 1200);
        cb.on_request_start("Claude", 1200);
        cb.on_response("Claude", 800);
        cb.on_fallback(ParseStrategy::ObjectSpan);
        cb.on_complete(4);
        cb.on_error("boom");
    }

    #[test]
    fn overridden_methods_receive_events_and_others_default() {
        let rec = Recorder::default();
        rec.on_text_extracted("plans.pdf", 2, 99);
        rec.on_request_start("Gemini", 99);
        rec.on_fallback(ParseStrategy::TruncationRepair);
        rec.on_complete(7);

        let events = rec.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], "text plans.pdf 2 99");
        assert!(events[1].starts_with("fallback "));
        assert_eq!(events[2], "complete 7");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_request_start("Claude", 10);
        cb.on_complete(0);
    }
}
