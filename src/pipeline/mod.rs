//! Pipeline stages for roll extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. the rendering backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ select ──▶ render ──▶ encode ──▶ service ──▶ normalize ──▶ reconcile
//! (path/URL)  (policy)   (pdfium)   (base64)   (vision)    (strict CSV)   (merge)
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to a local file
//! 2. [`select`]    — decide which document pages are eligible and assign positions
//! 3. [`render`]    — rasterize eligible pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`]    — PNG-encode and base64-wrap each page for the service request
//! 5. [`service`]   — the extraction call with timeout/retry/backoff; the only
//!    stage with network I/O
//! 6. [`normalize`] — strict 8-column CSV parse of each page's raw text
//! 7. [`reconcile`] — merge all page tables into one gap-free serial run

pub mod encode;
pub mod input;
pub mod normalize;
pub mod reconcile;
pub mod render;
pub mod select;
pub mod service;
