//! Table normalization: parse one page's raw service output into a
//! [`PageTable`], rejecting anything that doesn't fit the 8-column schema.
//!
//! ## Why cleanup before parsing?
//!
//! Even well-instructed models occasionally wrap their output in
//! ` ```csv … ``` ` fences despite the instruction saying not to, or emit
//! Windows line endings. Two cheap deterministic passes fix those quirks
//! before the strict parse; keeping them here rather than in the
//! instruction means the instruction stays focused on *what to extract*.
//!
//! ## Strictness
//!
//! The parse is a tagged result, never an exception: good rows land in the
//! `PageTable`, bad rows become [`Anomaly`] entries with the page position
//! and row index attached. Partial success is the common case. The header
//! row is discarded — field order is trusted, only the count of each data
//! row is enforced. No sorting and no dedup happens here; that is the
//! reconciler's job.

use crate::table::{Anomaly, AnomalyKind, PageTable, Record, FIELD_COUNT};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:csv)?\n(.*)\n```\s*$").unwrap());

/// Strip a wrapping code fence the model sometimes adds despite the
/// instruction.
fn strip_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Parse one page's raw text into a [`PageTable`] plus its anomaly report.
///
/// Expects exactly one header row followed by zero or more quoted
/// 8-field data rows. Rows with any other field count are dropped and
/// reported. Empty text or zero data rows yields an empty, valid table
/// with an `EmptyPage` anomaly so the operator knows the page produced
/// nothing.
pub fn normalize_page(position: usize, raw_text: &str) -> (PageTable, Vec<Anomaly>) {
    let mut table = PageTable::new(position);
    let mut anomalies = Vec::new();

    let cleaned = normalize_line_endings(&strip_fences(raw_text));
    if cleaned.trim().is_empty() {
        anomalies.push(
            Anomaly::new(AnomalyKind::EmptyPage, "service returned no text")
                .with_page(position),
        );
        return (table, anomalies);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true) // first row is the header, discarded unchecked
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(cleaned.as_bytes());

    for (row_idx, result) in reader.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                anomalies.push(
                    Anomaly::new(AnomalyKind::WrongFieldCount, format!("unparseable row: {e}"))
                        .with_page(position)
                        .with_row(row_idx),
                );
                continue;
            }
        };

        let fields: Vec<&str> = row.iter().collect();
        match Record::from_fields(&fields) {
            Some(record) => table.records.push(record),
            None => {
                anomalies.push(
                    Anomaly::new(
                        AnomalyKind::WrongFieldCount,
                        format!("expected {} fields, got {}", FIELD_COUNT, fields.len()),
                    )
                    .with_page(position)
                    .with_row(row_idx),
                );
            }
        }
    }

    if table.records.is_empty() && anomalies.is_empty() {
        anomalies.push(
            Anomaly::new(AnomalyKind::EmptyPage, "page produced no data rows")
                .with_page(position),
        );
    }

    debug!(
        "Page {}: {} rows kept, {} anomalies",
        position,
        table.records.len(),
        anomalies.len()
    );

    (table, anomalies)
}
