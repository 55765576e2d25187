//! Page selection: decide which document pages are eligible for extraction
//! and assign each a stable 1-based sequence position.
//!
//! The only policy here is the trailing-page skip: the rolls this tool was
//! built for end with a non-data cover page, so the final
//! `config.skip_trailing` pages (default 1) are excluded without inspecting
//! their content. The skip is configurable because the heuristic is about
//! the input corpus, not a verified property of every document.

use crate::error::ExtractError;
use tracing::info;

/// Compute the 0-based document indices of eligible pages.
///
/// Index `i` of the returned vector holds the document index of the page
/// at sequence position `i + 1`.
///
/// # Errors
/// - [`ExtractError::EmptyDocument`] when the document has no pages.
/// - [`ExtractError::NoEligiblePages`] when the trailing skip consumes
///   every page (e.g. a single-page document with the default skip).
pub fn eligible_indices(
    total_pages: usize,
    skip_trailing: usize,
) -> Result<Vec<usize>, ExtractError> {
    if total_pages == 0 {
        return Err(ExtractError::EmptyDocument);
    }

    let eligible = total_pages.saturating_sub(skip_trailing);
    if eligible == 0 {
        return Err(ExtractError::NoEligiblePages {
            total: total_pages,
            skipped: skip_trailing,
        });
    }

    info!(
        "Page selection: {} of {} pages eligible ({} trailing skipped)",
        eligible, total_pages, skip_trailing
    );

    Ok((0..eligible).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_trailing_page_by_default_policy() {
        let indices = eligible_indices(5, 1).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn skip_zero_keeps_every_page() {
        let indices = eligible_indices(3, 0).unwrap();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn empty_document_is_fatal() {
        assert!(matches!(
            eligible_indices(0, 1),
            Err(ExtractError::EmptyDocument)
        ));
    }

    #[test]
    fn single_page_document_has_no_eligible_pages() {
        // A single-page document with the default skip must fail before
        // any extraction is attempted.
        match eligible_indices(1, 1) {
            Err(ExtractError::NoEligiblePages { total, skipped }) => {
                assert_eq!(total, 1);
                assert_eq!(skipped, 1);
            }
            other => panic!("expected NoEligiblePages, got {other:?}"),
        }
    }

    #[test]
    fn oversized_skip_saturates() {
        assert!(matches!(
            eligible_indices(2, 10),
            Err(ExtractError::NoEligiblePages { .. })
        ));
    }
}
