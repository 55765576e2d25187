//! Run output types: per-page outcomes, run statistics, and the combined
//! result returned by [`crate::extract::extract`].

use crate::error::PageError;
use crate::table::{Anomaly, MergedTable};
use serde::{Deserialize, Serialize};

/// The outcome of extracting one page, success or failure.
///
/// `error.is_none()` means the page produced a (possibly empty) record set;
/// the rows themselves live in the merged table, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-based position within the eligible page sequence.
    pub position: usize,
    /// 0-based index of the page in the source document.
    pub source_page: usize,
    /// Data rows that survived normalization for this page.
    pub rows: usize,
    /// Wall-clock time spent on the service call(s) for this page.
    pub duration_ms: u64,
    /// Retries consumed before success or giving up.
    pub retries: u8,
    /// Set when the page was excluded from the merge.
    pub error: Option<PageError>,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that passed selection.
    pub eligible_pages: usize,
    /// Pages whose service call and normalization succeeded.
    pub extracted_pages: usize,
    /// Pages excluded because of a service or render failure.
    pub failed_pages: usize,
    /// Records in the merged table carrying extracted data.
    pub data_rows: usize,
    /// Synthesized gap-filler records in the merged table.
    pub placeholder_rows: usize,
    /// Smallest serial number observed, if any record was usable.
    pub min_serial: Option<i64>,
    /// Largest serial number observed, if any record was usable.
    pub max_serial: Option<i64>,
    pub render_duration_ms: u64,
    pub service_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a run produces: the reconciled table, per-page outcomes, the
/// anomaly report, and timing/counting statistics.
///
/// Returned by [`crate::extract::extract`] even when some pages failed —
/// check `stats.failed_pages` and `anomalies` for partial-success detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub table: MergedTable,
    pub pages: Vec<PageOutcome>,
    pub anomalies: Vec<Anomaly>,
    pub stats: RunStats,
    /// The deflate ZIP of page images, built when the run rasterized a PDF.
    /// `None` when the input was already an image bundle. Excluded from the
    /// JSON representation; write it out with
    /// [`crate::extract::extract_to_files`] or directly.
    #[serde(skip)]
    pub image_bundle: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Anomaly, AnomalyKind};

    #[test]
    fn output_serialises_to_json_and_back() {
        let output = ExtractionOutput {
            table: MergedTable::empty(),
            pages: vec![PageOutcome {
                position: 1,
                source_page: 0,
                rows: 0,
                duration_ms: 12,
                retries: 0,
                error: Some(PageError::Timeout { page: 1, secs: 60 }),
            }],
            anomalies: vec![Anomaly::new(AnomalyKind::ServiceFailed, "timed out").with_page(1)],
            stats: RunStats::default(),
            image_bundle: None,
        };

        let json = serde_json::to_string(&output).expect("serialise");
        let back: ExtractionOutput = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.pages.len(), 1);
        assert_eq!(back.anomalies[0].page, Some(1));
        assert!(back.table.is_empty());
    }
}
