//! Extraction entry points.
//!
//! [`analyze_text`] is the core request: document text in, validated
//! [`ExtractionResult`] out, with exactly one LLM call in between. The other
//! functions get text out of a PDF first ([`extract`], [`extract_from_bytes`])
//! or stop before the LLM ([`extract_document_text`], [`inspect`]).

use crate::config::ExtractionConfig;
use crate::error::TakeoffError;
use crate::output::{
    DocumentMetadata, DocumentText, ExtractionOutput, ExtractionResult, ExtractionStats,
};
use crate::pipeline::recover::{self, ParseStrategy};
use crate::pipeline::{input, llm, normalize, text, validate};
use crate::prompts;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Run one extraction request over already-extracted document text.
///
/// Empty text is rejected before any provider is contacted. Otherwise the
/// text is normalised, cut to `max_input_chars`, wrapped in the provider's
/// prompt and sent once. The answer goes through response recovery and
/// shape validation; a result that fails validation fails the request.
///
/// # Errors
/// - [`TakeoffError::EmptyText`] for empty or whitespace-only text
/// - provider and transport errors from the single LLM call
/// - [`TakeoffError::ValidationFailed`] when the recovered object has the
///   wrong shape
pub async fn analyze_text(
    text: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TakeoffError> {
    let result = analyze_text_inner(text, config).await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_error(&e.to_string());
    }
    result
}

async fn analyze_text_inner(
    text: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TakeoffError> {
    let total_start = Instant::now();
    let provider = config.provider;

    if text.trim().is_empty() {
        return Err(TakeoffError::EmptyText);
    }

    // ── Step 1: Normalise and bound the text ─────────────────────────────
    let normalized = normalize::normalize_text(text);
    if normalized.is_empty() {
        return Err(TakeoffError::EmptyText);
    }
    let bounded = normalize::truncate_text(&normalized, config.max_input_chars);
    let source_chars = text.chars().count();
    let submitted_chars = bounded.text.chars().count();
    debug!(
        "Normalised {} chars to {} (truncated: {})",
        source_chars, submitted_chars, bounded.truncated
    );

    // ── Step 2: Build the prompt ─────────────────────────────────────────
    let prompt = match config.prompt_template {
        Some(ref template) => prompts::render_template(template, &bounded.text),
        None => prompts::build_prompt(provider, &bounded.text),
    };

    // ── Step 3: One LLM call ─────────────────────────────────────────────
    let client = resolve_llm(config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_start(provider.display_name(), submitted_chars);
    }
    let answer = llm::ask(&client, provider, &prompt, config).await?;
    let response_chars = answer.text.chars().count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_response(provider.display_name(), response_chars);
    }

    // ── Step 4: Recover and validate ─────────────────────────────────────
    let (result, strategy) = interpret_answer(&answer.text, provider.display_name())?;
    if strategy != ParseStrategy::Direct {
        if let Some(ref cb) = config.progress_callback {
            cb.on_fallback(strategy);
        }
    }

    let stats = ExtractionStats {
        source_chars,
        submitted_chars,
        truncated: bounded.truncated,
        input_tokens: answer.input_tokens,
        output_tokens: answer.output_tokens,
        response_chars,
        strategy,
        llm_duration_ms: answer.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} items from {} ({}ms)",
        result.extracted_items.len(),
        provider,
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_complete(result.extracted_items.len());
    }

    Ok(ExtractionOutput {
        result,
        provider,
        model: config.effective_model().to_string(),
        stats,
    })
}

/// Recover a JSON object from a raw answer and validate its shape.
///
/// Recovery never fails; the placeholder it falls back to is itself a valid
/// result, so only a recovered object of the wrong shape is an error.
pub fn interpret_answer(
    raw: &str,
    provider_name: &str,
) -> Result<(ExtractionResult, ParseStrategy), TakeoffError> {
    let recovered = recover::recover(raw, provider_name);
    let result =
        validate::validate(&recovered.value).map_err(|detail| TakeoffError::ValidationFailed {
            provider: provider_name.to_string(),
            detail,
        })?;
    Ok((result, recovered.strategy))
}

/// Extract construction data from a PDF file or URL.
///
/// # Example
/// ```rust,no_run
/// use pdf_takeoff::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let output = extract("mechanical-schedule.pdf", &config).await?;
/// println!("{}", output.result.to_markdown());
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TakeoffError> {
    let doc = extract_document_text(input_str, config).await?;
    analyze_text(&doc.text, config).await
}

/// Extract construction data from PDF bytes held in memory.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TakeoffError> {
    let resolved = input::resolve_bytes(bytes, "document.pdf", config).await?;
    let doc = read_text(&resolved, config).await?;
    analyze_text(&doc.text, config).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TakeoffError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TakeoffError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Extract and write the result as pretty JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, TakeoffError> {
    let output = extract(input_str, config).await?;
    let json = serde_json::to_string_pretty(&output.result)
        .map_err(|e| TakeoffError::Internal(format!("Failed to serialise result: {}", e)))?;
    write_atomic(output_path.as_ref(), json.as_bytes()).await?;
    Ok(output.stats)
}

/// Pull the text layer out of a PDF without calling any LLM.
///
/// # Errors
/// [`TakeoffError::EmptyText`] when the document has no extractable text
/// (typically a scanned drawing set without OCR).
pub async fn extract_document_text(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentText, TakeoffError> {
    let input_str = input_str.as_ref();
    info!("Extracting text: {}", input_str);
    let result = match input::resolve_input(input_str, config).await {
        Ok(resolved) => read_text(&resolved, config).await,
        Err(e) => Err(e),
    };
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_error(&e.to_string());
    }
    result
}

/// Read PDF metadata without extracting content.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, TakeoffError> {
    let resolved = input::resolve_input(input_str.as_ref(), config).await?;
    text::extract_metadata(resolved.path(), config.password.as_deref()).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_text(
    resolved: &input::ResolvedInput,
    config: &ExtractionConfig,
) -> Result<DocumentText, TakeoffError> {
    let doc = text::extract_text(
        resolved.path(),
        config.password.as_deref(),
        &resolved.file_name(),
        resolved.size(),
    )
    .await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_text_extracted(&doc.file_name, doc.page_count, doc.text.chars().count());
    }
    if doc.text.trim().is_empty() {
        return Err(TakeoffError::EmptyText);
    }
    Ok(doc)
}

/// The LLM client for this request.
///
/// A pre-built client in the config wins. Otherwise the provider's API key
/// must be set and [`ProviderFactory`] builds a client for the effective
/// model.
fn resolve_llm(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, TakeoffError> {
    if let Some(ref client) = config.llm {
        return Ok(Arc::clone(client));
    }

    let provider = config.provider;
    let key_set = std::env::var(provider.api_key_env())
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if !key_set {
        return Err(TakeoffError::ProviderNotConfigured {
            provider: provider.display_name().to_string(),
            hint: format!("Set {} to use {}.", provider.api_key_env(), provider),
        });
    }

    ProviderFactory::create_llm_provider(provider.factory_name(), config.effective_model())
        .map_err(|e| TakeoffError::ProviderNotConfigured {
            provider: provider.display_name().to_string(),
            hint: format!("{e}"),
        })
}

/// Write `bytes` to `path` via a sibling `.tmp` file and a rename, creating
/// parent directories as needed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TakeoffError> {
    let write_err = |e: std::io::Error| TakeoffError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
