//! Progress-callback trait for per-page run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each page.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a log, or a job queue
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because pages are extracted concurrently.

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_page_start`, `on_page_complete`, and `on_page_error` may fire
/// concurrently from different workers. Implementations must protect
/// shared mutable state themselves.
pub trait RunProgressCallback: Send + Sync {
    /// Called once, after page selection, before any service call.
    fn on_run_start(&self, eligible_pages: usize) {
        let _ = eligible_pages;
    }

    /// Called just before the service request is sent for a page.
    fn on_page_start(&self, position: usize, total: usize) {
        let _ = (position, total);
    }

    /// Called when a page's output has been extracted and normalized.
    fn on_page_complete(&self, position: usize, total: usize, rows: usize) {
        let _ = (position, total, rows);
    }

    /// Called when a page fails after all retries are exhausted.
    fn on_page_error(&self, position: usize, total: usize, error: String) {
        let _ = (position, total, error);
    }

    /// Called once after reconciliation, with the final table size.
    fn on_run_complete(&self, eligible_pages: usize, merged_rows: usize) {
        let _ = (eligible_pages, merged_rows);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl RunProgressCallback for TrackingCallback {
        fn on_page_start(&self, _position: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _position: usize, _total: usize, _rows: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _position: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 24);
        cb.on_page_error(2, 3, "timeout".to_string());
        cb.on_run_complete(3, 48);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        t.on_page_start(1, 2);
        t.on_page_complete(1, 2, 30);
        t.on_page_start(2, 2);
        t.on_page_error(2, 2, "HTTP 503".to_string());

        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_is_send() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn RunProgressCallback>();

        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_page_error(1, 1, "an error".to_string());
    }
}
