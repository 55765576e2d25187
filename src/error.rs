//! Error types for the rolltab library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed at all (unreadable
//!   document, zero eligible pages, provider not configured, zero usable
//!   records). Returned as `Err(ExtractError)` from the top-level `extract*`
//!   functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch,
//!   transient service error, timeout) but all other pages are fine. Stored
//!   inside [`crate::output::PageOutcome`] so callers can inspect partial
//!   success rather than losing the whole document to one bad page.
//!
//! The separation is the propagation policy of the whole crate: per-page
//! failures never abort the run; only document-level failure and total data
//! loss are terminal.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the rolltab library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("file is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// A previously produced image bundle could not be read back.
    #[error("image bundle '{path}' is unreadable: {detail}")]
    CorruptArchive { path: PathBuf, detail: String },

    /// The document rasterized to zero pages.
    #[error("document has no pages")]
    EmptyDocument,

    /// Page selection left nothing to extract (e.g. a single-page document
    /// with the trailing-page skip active).
    #[error(
        "no eligible pages: document has {total} page(s), trailing skip is {skipped}\n\
         Use --skip-trailing 0 to extract every page."
    )]
    NoEligiblePages { total: usize, skipped: usize },

    // ── Service errors ────────────────────────────────────────────────────
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// No numeric-serial record survived normalization and reconciliation.
    #[error(
        "no usable records: {pages} page(s) attempted, every row was dropped\n\
         Inspect the anomaly report and re-run the affected pages."
    )]
    NoData { pages: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV or ZIP serialisation failed while packaging an artifact.
    #[error("failed to package artifact: {0}")]
    PackagingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "failed to bind to pdfium library: {0}\n\
         Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageOutcome`] when a page fails. The overall
/// run continues unless every page fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterization failed.
    #[error("page {page}: rasterization failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Extraction service call failed after retries.
    #[error("page {page}: extraction failed after {retries} retries: {detail}")]
    ServiceFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// Extraction service call timed out.
    #[error("page {page}: extraction timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_eligible_pages_display() {
        let e = ExtractError::NoEligiblePages {
            total: 1,
            skipped: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("1 page(s)"), "got: {msg}");
        assert!(msg.contains("--skip-trailing"), "got: {msg}");
    }

    #[test]
    fn no_data_display() {
        let e = ExtractError::NoData { pages: 4 };
        assert!(e.to_string().contains("4 page(s)"));
    }

    #[test]
    fn service_failed_display() {
        let e = PageError::ServiceFailed {
            page: 3,
            retries: 2,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("2 retries"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn timeout_display() {
        let e = PageError::Timeout { page: 7, secs: 60 };
        assert!(e.to_string().contains("page 7"));
        assert!(e.to_string().contains("60s"));
    }
}
