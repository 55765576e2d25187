//! CLI binary for rolltab.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and writes the artifacts.

use anyhow::{Context, Result};
use clap::Parser;
use rolltab::{
    extract, package_table, DuplicatePolicy, ExtractionConfig, ProgressCallback,
    RunProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
/// Shorten a long error message to `max_chars` characters, ellipsis
/// included. Counts chars, not bytes, so multi-byte provider messages
/// cannot split a character.
fn truncate_message(error: String, max_chars: usize) -> String {
    if error.chars().count() <= max_chars {
        return error;
    }
    let cut: String = error.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}\u{2026}")
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Designed to work correctly when pages complete
/// out-of-order (concurrent extraction).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of pages that errored out.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called before any pages are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, eligible_pages: usize) {
        // Switch from spinner-only style to full progress bar now that we
        // know the actual page count.
        self.activate_bar(eligible_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {eligible_pages} pages…"))
        ));
    }

    fn on_page_start(&self, position: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(position, Instant::now());
        self.bar.set_message(format!("page {position}"));
    }

    fn on_page_complete(&self, position: usize, total: usize, rows: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&position)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            position,
            total,
            dim(&format!("{rows:>4} rows")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, position: usize, total: usize, error: String) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&position)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = truncate_message(error, 80);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            position,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, eligible_pages: usize, merged_rows: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted, {} rows reconciled",
                green("✔"),
                bold(&eligible_pages.to_string()),
                bold(&merged_rows.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted ({} failed), {} rows reconciled",
                if failed == eligible_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(eligible_pages - failed).to_string()),
                eligible_pages,
                red(&failed.to_string()),
                bold(&merged_rows.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (CSV to stdout)
  rolltab roll.pdf

  # Write CSV and the page-image bundle
  rolltab roll.pdf -o roll.csv --images-zip roll_images.zip

  # Re-run the service against a bundle from an earlier run (no PDF needed)
  rolltab roll_images.zip -o roll.csv

  # Use a specific model
  rolltab --model gpt-4.1 --provider openai roll.pdf -o roll.csv

  # Extract from URL
  rolltab https://ceo.example.gov/rolls/part-042.pdf -o part-042.csv

  # Every page carries data — disable the trailing-page skip
  rolltab --skip-trailing 0 roll.pdf -o roll.csv

  # Structured JSON report (table + per-page outcomes + anomalies)
  rolltab --json roll.pdf > report.json

ANOMALY REPORT:
  Rows and pages that could not enter the merged table are never silently
  dropped: each exclusion (wrong field count, non-numeric serial, duplicate
  serial, failed page) is listed after the run with its page and row, and
  serials nobody produced appear as placeholder rows in the CSV.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium shared library

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         rolltab roll.pdf -o roll.csv
"#;

/// Extract enrollment-roll tables from scanned PDFs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "rolltab",
    version,
    about = "Extract enrollment-roll tables from scanned PDFs using Vision LLMs",
    long_about = "Extract the tabular content of scanned enrollment rolls (local files or URLs) \
into one continuous serial-numbered CSV using Vision Language Models. Supports OpenAI, \
Anthropic, Google Gemini, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF path, HTTP/HTTPS URL, or a page-image ZIP from an earlier run.
    input: String,

    /// Write the merged CSV to this file instead of stdout.
    #[arg(short, long, env = "ROLLTAB_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the page-image ZIP bundle to this file.
    #[arg(long, env = "ROLLTAB_IMAGES_ZIP")]
    images_zip: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "ROLLTAB_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Number of concurrent extraction-service calls.
    #[arg(short, long, env = "ROLLTAB_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Trailing document pages to exclude (the rolls end in a cover page).
    #[arg(long, env = "ROLLTAB_SKIP_TRAILING", default_value_t = 1)]
    skip_trailing: usize,

    /// Tie-break for duplicate serial numbers.
    #[arg(long, env = "ROLLTAB_DUPLICATES", value_enum, default_value = "first")]
    duplicates: DuplicatesArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ROLLTAB_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom extraction instruction.
    #[arg(long, env = "ROLLTAB_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "ROLLTAB_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ROLLTAB_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on a service failure.
    #[arg(long, env = "ROLLTAB_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Output structured JSON (table + outcomes + anomalies) instead of CSV.
    #[arg(long, env = "ROLLTAB_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ROLLTAB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ROLLTAB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ROLLTAB_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ROLLTAB_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page service call timeout in seconds.
    #[arg(long, env = "ROLLTAB_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DuplicatesArg {
    First,
    Last,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(v: DuplicatesArg) -> Self {
        match v {
            DuplicatesArg::First => DuplicatePolicy::FirstWins,
            DuplicatesArg::Last => DuplicatePolicy::LastWins,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    // The progress bar is initialised with a spinner (no page count yet);
    // `on_run_start` resizes it to the correct total once the document has
    // been opened and the trailing skip applied.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RunProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let csv = package_table(&output.table).context("Failed to serialise CSV")?;
        match cli.output {
            Some(ref path) => {
                std::fs::write(path, &csv)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} rows  →  {}",
                        green("✔"),
                        output.table.len(),
                        bold(&path.display().to_string()),
                    );
                }
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(&csv).context("Failed to write to stdout")?;
            }
        }
    }

    if let Some(ref path) = cli.images_zip {
        match output.image_bundle {
            Some(ref bundle) => {
                std::fs::write(path, bundle)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  image bundle ({} bytes)  →  {}",
                        green("✔"),
                        bundle.len(),
                        bold(&path.display().to_string()),
                    );
                }
            }
            None => eprintln!(
                "{}  input was already an image bundle; --images-zip skipped",
                cyan("⚠")
            ),
        }
    }

    // ── Anomaly report ───────────────────────────────────────────────────
    if !cli.quiet && !cli.json && !output.anomalies.is_empty() {
        eprintln!(
            "{} {} anomalies:",
            cyan("⚠"),
            bold(&output.anomalies.len().to_string())
        );
        for anomaly in &output.anomalies {
            let loc = match (anomaly.page, anomaly.row) {
                (Some(p), Some(r)) => format!("page {p} row {r}"),
                (Some(p), None) => format!("page {p}"),
                _ => "run".to_string(),
            };
            eprintln!("   {}  {}", dim(&loc), anomaly.message);
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   serials {}..={}  {} data rows  {} placeholders  {}ms total",
            output.table.min_serial,
            output.table.max_serial,
            dim(&output.stats.data_rows.to_string()),
            dim(&output.stats.placeholder_rows.to_string()),
            output.stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let instruction = if let Some(ref path) = cli.instruction {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read instruction from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .skip_trailing(cli.skip_trailing)
        .duplicates(cli.duplicates.clone().into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder setters would wrap in Some() unconditionally
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.password = cli.password.clone();
    config.instruction = instruction;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::truncate_message;

    #[test]
    fn short_messages_pass_through() {
        let msg = "HTTP 503".to_string();
        assert_eq!(truncate_message(msg.clone(), 80), msg);
    }

    #[test]
    fn long_multibyte_messages_truncate_cleanly() {
        // Provider errors can carry non-ASCII text; a byte-indexed cut
        // would panic mid-character here.
        let msg = "é".repeat(200);
        let out = truncate_message(msg, 80);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('\u{2026}'));
    }
}
