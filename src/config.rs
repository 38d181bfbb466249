//! Configuration types for a takeoff extraction request.
//!
//! All request behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Setters clamp out-of-range values;
//! [`ExtractionConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::TakeoffError;
use crate::pipeline::normalize::DEFAULT_MAX_INPUT_CHARS;
use crate::progress::ProgressCallback;
use crate::provider::Provider;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default upper bound for a PDF read from disk or downloaded: 10 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Placeholder a custom prompt template must contain.
pub const DOCUMENT_TEXT_PLACEHOLDER: &str = "{document_text}";

/// Configuration for one extraction request.
///
/// # Example
/// ```rust
/// use pdf_takeoff::{ExtractionConfig, Provider};
///
/// let config = ExtractionConfig::builder()
///     .provider(Provider::Gemini)
///     .max_input_chars(20_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.provider, Provider::Gemini);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which service interprets the text. Default: Claude.
    pub provider: Provider,

    /// Model identifier. If None, uses [`Provider::default_model`].
    pub model: Option<String>,

    /// Pre-constructed LLM client. Takes precedence over `provider`/`model`
    /// for the network call; `provider` still selects the prompt template
    /// and the name used in messages.
    pub llm: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Structured output wants the model to be as deterministic as possible.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4000.
    ///
    /// Large schedules can exceed this; the truncation repair step then
    /// salvages what it can.
    pub max_tokens: usize,

    /// Maximum characters of normalised document text sent to the model.
    /// Default: 50 000.
    pub max_input_chars: usize,

    /// Largest PDF accepted as input, in bytes. Default: 10 MiB.
    pub max_file_bytes: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom prompt template. Must contain `{document_text}`.
    /// If None, the provider's built-in template is used.
    pub prompt_template: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the single LLM call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Receives per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            llm: None,
            temperature: 0.1,
            max_tokens: 4000,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            password: None,
            prompt_template: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("llm", &self.llm.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("prompt_template", &self.prompt_template.is_some())
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will be requested from the provider.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn provider(mut self, provider: Provider) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.config.llm = Some(llm);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n.max(1);
        self
    }

    pub fn max_file_bytes(mut self, n: u64) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, TakeoffError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(TakeoffError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_file_bytes == 0 {
            return Err(TakeoffError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(TakeoffError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if let Some(ref t) = c.prompt_template {
            if !t.contains(DOCUMENT_TEXT_PLACEHOLDER) {
                return Err(TakeoffError::InvalidConfig(format!(
                    "prompt template must contain {DOCUMENT_TEXT_PLACEHOLDER}"
                )));
            }
        }
        Ok(self.config)
    }
}
