//! CLI binary for pdf-takeoff.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, keeps the last extracted text in a `FileTextStore`
//! and prints results as JSON or Markdown.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_takeoff::{
    analyze_text, extract_document_text, inspect, write_atomic, ExtractionConfig,
    ExtractionOutput, ExtractionProgressCallback, FileTextStore, ParseStrategy,
    ProgressCallback, Provider, TextStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner whose prefix tracks the current
/// stage, with a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_text_extracted(&self, file_name: &str, page_count: usize, chars: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            file_name,
            dim(&format!("{page_count} pages, {chars} chars")),
        ));
    }

    fn on_request_start(&self, provider: &str, submitted_chars: usize) {
        self.bar.set_prefix("Analysing");
        self.bar
            .set_message(format!("{submitted_chars} chars sent to {provider}…"));
    }

    fn on_response(&self, provider: &str, response_chars: usize) {
        self.bar.println(format!(
            "  {} {} answered  {}",
            green("✓"),
            provider,
            dim(&format!("{response_chars} chars")),
        ));
        self.bar.set_prefix("Parsing");
        self.bar.set_message("Validating response…");
    }

    fn on_fallback(&self, strategy: ParseStrategy) {
        let line = if strategy == ParseStrategy::Sentinel {
            red("response could not be parsed; returning placeholder result")
        } else {
            yellow(&format!("response repaired ({strategy})"))
        };
        self.bar.println(format!("  {} {}", cyan("⚠"), line));
    }

    fn on_complete(&self, items: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} items extracted", green("✔"), bold(&items.to_string()));
    }

    fn on_error(&self, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract construction data (JSON on stdout)
  takeoff mechanical-schedule.pdf

  # Markdown tables to a file, using Gemini
  takeoff --provider gemini --format markdown plans.pdf -o takeoff.md

  # Extract text only (stored for later)
  takeoff --text-only specs.pdf > specs.txt

  # Re-run the last extracted text with another provider
  takeoff --from-store --provider gemini

  # Inspect PDF metadata (no API key needed)
  takeoff --inspect-only plans.pdf

  # From a URL
  takeoff https://example.com/drawings/M-601.pdf

PROVIDERS:
  Provider   Default model                 API key
  ────────   ───────────────────────────   ─────────────────
  claude     claude-3-5-sonnet-20241022    ANTHROPIC_API_KEY
  gemini     gemini-1.5-flash-latest       GEMINI_API_KEY

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY     Anthropic API key
  GEMINI_API_KEY        Google Gemini API key
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)
  TAKEOFF_*             Any flag, e.g. TAKEOFF_PROVIDER=gemini
  RUST_LOG              Override log filter
"#;

/// Extract construction takeoff data from PDF documents using Claude or Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "takeoff",
    version,
    about = "Extract construction takeoff data from PDF documents using Claude or Gemini",
    long_about = "Extract equipment, fixtures, materials and quantities from construction \
PDF documents (local files or URLs). The document's text layer is sent to Claude or Gemini \
and the answer is repaired, validated and printed as JSON or Markdown tables.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present_any = ["from_store", "clear_store"])]
    input: Option<String>,

    /// LLM provider: claude or gemini.
    #[arg(long, env = "TAKEOFF_PROVIDER", default_value = "claude")]
    provider: Provider,

    /// Model ID. Defaults to the provider's default model.
    #[arg(long, env = "TAKEOFF_MODEL")]
    model: Option<String>,

    /// Maximum characters of document text sent to the model.
    #[arg(long, env = "TAKEOFF_MAX_CHARS", default_value_t = 50_000)]
    max_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TAKEOFF_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "TAKEOFF_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "TAKEOFF_PASSWORD")]
    password: Option<String>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "TAKEOFF_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "TAKEOFF_FORMAT", value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extract and print document text only; no LLM call.
    #[arg(long, conflicts_with_all = ["from_store", "inspect_only"])]
    text_only: bool,

    /// Analyse the last stored text instead of reading a PDF.
    #[arg(long, conflicts_with = "inspect_only")]
    from_store: bool,

    /// Remove the stored text.
    #[arg(long)]
    clear_store: bool,

    /// Location of the stored text file.
    #[arg(long, env = "TAKEOFF_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Do not save extracted text to the store.
    #[arg(long, env = "TAKEOFF_NO_STORE")]
    no_store: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TAKEOFF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "TAKEOFF_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TAKEOFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TAKEOFF_QUIET")]
    quiet: bool,

    /// Disable progress spinner.
    #[arg(long, env = "TAKEOFF_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.inspect_only
        && !cli.text_only
        && !cli.clear_store;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = store_for(&cli)?;

    // ── Store maintenance ────────────────────────────────────────────────
    if cli.clear_store {
        if let Some(ref store) = store {
            store.clear().context("Failed to clear stored text")?;
        }
        if !cli.quiet {
            eprintln!("{} Stored text cleared", green("✔"));
        }
        if cli.input.is_none() && !cli.from_store {
            return Ok(());
        }
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = require_input(&cli)?;
        let meta = inspect(input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.format == OutputFormat::Json {
            let json = serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?;
            emit(&cli, &json).await?;
        } else {
            let mut lines = vec![format!("File:         {input}")];
            let optional = [
                ("Title", &meta.title),
                ("Author", &meta.author),
                ("Subject", &meta.subject),
                ("Creator", &meta.creator),
                ("Producer", &meta.producer),
                ("Created", &meta.creation_date),
                ("Modified", &meta.modification_date),
            ];
            for (label, value) in optional {
                if let Some(v) = value {
                    lines.push(format!("{:<14}{v}", format!("{label}:")));
                }
            }
            lines.push(format!("Pages:        {}", meta.page_count));
            lines.push(format!("PDF Version:  {}", meta.pdf_version));
            emit(&cli, &lines.join("\n")).await?;
        }
        return Ok(());
    }

    // ── Obtain document text ─────────────────────────────────────────────
    let text = if cli.from_store {
        let stored = store
            .as_ref()
            .context("Text store unavailable")?
            .load()
            .context("Failed to read stored text")?
            .context("No stored text. Run `takeoff <PDF>` or `takeoff --text-only <PDF>` first.")?;
        if !cli.quiet {
            eprintln!(
                "{} Using stored text from {}  {}",
                cyan("◆"),
                bold(&stored.file_name),
                dim(&format!(
                    "extracted {}",
                    stored.extracted_at.format("%Y-%m-%d %H:%M UTC")
                )),
            );
        }
        stored.text
    } else {
        let input = require_input(&cli)?;
        let doc = extract_document_text(input, &config)
            .await
            .context("Text extraction failed")?;
        if let Some(ref store) = store {
            store
                .save(&doc.text, &doc.file_name, doc.file_size)
                .context("Failed to store extracted text")?;
        }
        doc.text
    };

    if cli.text_only {
        emit(&cli, &text).await?;
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = analyze_text(&text, &config)
        .await
        .context("Extraction failed")?;

    let rendered = match cli.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&output.result).context("Failed to serialise result")?
        }
        OutputFormat::Markdown => output.result.to_markdown(),
    };
    emit(&cli, &rendered).await?;

    if !cli.quiet {
        print_summary(&output, cli.output.as_deref());
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .provider(cli.provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_input_chars(cli.max_chars)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Open the text store only when this invocation reads, writes or clears it.
fn store_for(cli: &Cli) -> Result<Option<FileTextStore>> {
    let needed = cli.clear_store || cli.from_store || (!cli.inspect_only && !cli.no_store);
    if needed {
        open_store(cli).map(Some)
    } else {
        Ok(None)
    }
}

fn open_store(cli: &Cli) -> Result<FileTextStore> {
    match cli.store_path {
        Some(ref p) => Ok(FileTextStore::new(p.clone())),
        None => FileTextStore::open_default().context("Failed to locate text store"),
    }
}

fn require_input(cli: &Cli) -> Result<&str> {
    cli.input
        .as_deref()
        .context("An input PDF path or URL is required")
}

/// Write to `--output` (atomically) or stdout.
async fn emit(cli: &Cli, content: &str) -> Result<()> {
    match cli.output {
        Some(ref path) => write_atomic(path, content.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            if !content.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}

fn print_summary(output: &ExtractionOutput, written_to: Option<&Path>) {
    let stats = &output.stats;
    let mark = if output.result.is_parse_failure() {
        red("✘")
    } else if stats.strategy == ParseStrategy::Direct {
        green("✔")
    } else {
        cyan("⚠")
    };
    let target = written_to
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {} items  {} ({})  {}ms{}",
        mark,
        output.result.extracted_items.len(),
        output.provider,
        output.model,
        stats.total_duration_ms,
        target,
    );
    let truncated = if stats.truncated {
        format!("  {}", yellow("text truncated"))
    } else {
        String::new()
    };
    eprintln!(
        "   {} tokens in  /  {} tokens out{}",
        dim(&stats.input_tokens.to_string()),
        dim(&stats.output_tokens.to_string()),
        truncated,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("takeoff").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn store_is_not_opened_when_unused() {
        assert!(store_for(&parse(&["--inspect-only", "plan.pdf"])).unwrap().is_none());
        assert!(store_for(&parse(&["--no-store", "plan.pdf"])).unwrap().is_none());
    }

    #[test]
    fn store_is_opened_for_store_commands() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("last-text.json");
        let path_arg = path.to_str().unwrap();

        for args in [
            vec!["--from-store", "--store-path", path_arg],
            vec!["--clear-store", "--store-path", path_arg],
            vec!["--text-only", "plan.pdf", "--store-path", path_arg],
        ] {
            let store = store_for(&parse(&args)).unwrap().expect("store opened");
            assert_eq!(store.path(), path.as_path());
        }
    }
}
