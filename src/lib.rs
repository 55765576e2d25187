//! # rolltab
//!
//! Extract the enrollment table from scanned roll PDFs using vision
//! language models, reconciled into one gap-free serial-numbered CSV.
//!
//! ## Why this crate?
//!
//! Scanned rolls defeat conventional OCR-plus-heuristics tooling: the
//! pages are dense fixed-layout tables, photocopied and skewed, where a
//! single misread column boundary shreds every row after it. Instead this
//! crate rasterizes each page into a PNG and lets a vision model read it
//! as a human would, emitting one strict 8-column CSV per page. The pages
//! are then reconciled by serial number into a single continuous table:
//! duplicates across page boundaries are resolved, and serials no page
//! produced become placeholder rows, so row `k` always carries serial
//! `min + k`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / URL / image bundle
//!  │
//!  ├─ 1. Input      resolve local file or download; classify by magic bytes
//!  ├─ 2. Select     drop trailing non-data page(s)
//!  ├─ 3. Render     rasterize pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Encode     PNG → base64 ImageData (fed to both service and bundle)
//!  ├─ 5. Service    concurrent vision calls, fixed extraction instruction
//!  ├─ 6. Normalize  strict 8-column CSV parse, bad rows → anomalies
//!  ├─ 7. Reconcile  serial-keyed merge, gap fill, duplicate tie-break
//!  └─ 8. Package    fully quoted CSV + deflate ZIP of page images
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rolltab::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = extract("roll.pdf", &config).await?;
//!     std::fs::write("roll.csv", rolltab::package_table(&output.table)?)?;
//!     eprintln!(
//!         "serials {}..={}, {} placeholders, {} anomalies",
//!         output.table.min_serial,
//!         output.table.max_serial,
//!         output.stats.placeholder_rows,
//!         output.anomalies.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rolltab` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! rolltab = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{package_images, package_table, read_image_archive};
pub use config::{DuplicatePolicy, ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, PageError};
pub use extract::{extract, extract_from_bytes, extract_to_files};
pub use output::{ExtractionOutput, PageOutcome, RunStats};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use table::{
    Anomaly, AnomalyKind, MergedTable, PageTable, Record, COLUMN_HEADERS, FIELD_COUNT,
};
