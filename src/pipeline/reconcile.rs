//! Continuity reconciliation: merge per-page tables into one gap-free,
//! serial-ordered roll.
//!
//! ## The continuity guarantee
//!
//! Voter rolls are serially numbered, so the merged output is defined by
//! the observed serial range, not by which pages happened to extract
//! cleanly. For observed serials `[min, max]` the output has exactly
//! `max - min + 1` rows, one per serial. Serials nobody produced get a
//! placeholder row (empty fields, serial filled in) so downstream
//! consumers can align the table against the source by row offset alone.
//!
//! Duplicates are resolved by position: earlier pages win by default
//! because a serial repeated across a page boundary is usually the
//! carry-over row at the top of the next page, and the first occurrence
//! is the complete one. `LastWins` is available for re-extraction runs
//! where later pages are known to be better.
//!
//! Reconciliation never fails. Bad input degrades to anomalies and
//! placeholders, not errors. That includes a hallucinated twelve-digit
//! serial: extremes that would push the span past [`MAX_SERIAL_SPAN`] are
//! dropped and reported rather than gap-filled.

use crate::config::DuplicatePolicy;
use crate::table::{Anomaly, AnomalyKind, MergedTable, PageTable, Record};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Upper bound on the serial span one run may cover.
///
/// A roll part tops out in the low thousands of entries; a span wider than
/// this means the service misread a serial (an OCR'd photo-id, a year glued
/// onto a number), and gap-filling it would allocate a row per missing
/// serial. Offending extremes are dropped and reported instead.
pub const MAX_SERIAL_SPAN: i64 = 1_000_000;

fn span(min: i64, max: i64) -> i128 {
    max as i128 - min as i128 + 1
}

/// Merge per-page tables into one continuous, serial-keyed table.
///
/// Input order matters only for duplicate resolution: tables are walked
/// in slice order, rows in page order. Rows whose serial does not parse
/// as an integer are dropped and reported.
pub fn reconcile(
    pages: &[PageTable],
    policy: DuplicatePolicy,
) -> (MergedTable, Vec<Anomaly>) {
    let mut anomalies = Vec::new();
    let mut by_serial: BTreeMap<i64, Record> = BTreeMap::new();

    for page in pages {
        for (row_idx, record) in page.records.iter().enumerate() {
            let serial = match record.serial() {
                Some(s) => s,
                None => {
                    anomalies.push(
                        Anomaly::new(
                            AnomalyKind::NonNumericSerial,
                            format!("serial '{}' is not an integer", record.serial_no),
                        )
                        .with_page(page.position)
                        .with_row(row_idx),
                    );
                    continue;
                }
            };

            match by_serial.get(&serial) {
                None => {
                    by_serial.insert(serial, record.clone());
                }
                Some(_) => {
                    anomalies.push(
                        Anomaly::new(
                            AnomalyKind::DuplicateSerial,
                            format!("serial {} seen again, policy {:?}", serial, policy),
                        )
                        .with_page(page.position)
                        .with_row(row_idx)
                        .with_serial(serial),
                    );
                    if policy == DuplicatePolicy::LastWins {
                        by_serial.insert(serial, record.clone());
                    }
                }
            }
        }
    }

    if by_serial.is_empty() {
        debug!("No numeric serials observed; merged table is empty");
        return (MergedTable::empty(), anomalies);
    }

    // A single misread serial must not widen the gap fill into a giant
    // allocation. While the span is implausible, evict whichever extreme
    // sits across the larger gap from its neighbour.
    loop {
        let min = *by_serial.keys().next().unwrap();
        let max = *by_serial.keys().next_back().unwrap();
        if span(min, max) <= MAX_SERIAL_SPAN as i128 {
            break;
        }
        // span > 1 here, so the map holds at least two serials.
        let low_gap = span(min, *by_serial.keys().nth(1).unwrap());
        let high_gap = span(*by_serial.keys().rev().nth(1).unwrap(), max);
        let evicted = if high_gap >= low_gap { max } else { min };
        by_serial.remove(&evicted);
        warn!(
            "Serial {} widens the span past {}; row dropped",
            evicted, MAX_SERIAL_SPAN
        );
        anomalies.push(
            Anomaly::new(
                AnomalyKind::SerialOutOfRange,
                format!("serial {evicted} widens the span past {MAX_SERIAL_SPAN}"),
            )
            .with_serial(evicted),
        );
    }

    // BTreeMap keys are sorted, so first/last are min/max.
    let min_serial = *by_serial.keys().next().unwrap();
    let max_serial = *by_serial.keys().next_back().unwrap();

    let mut records = Vec::with_capacity((max_serial - min_serial + 1) as usize);
    let mut filled = 0usize;
    for serial in min_serial..=max_serial {
        match by_serial.remove(&serial) {
            Some(record) => records.push(record),
            None => {
                filled += 1;
                records.push(Record::placeholder(serial));
            }
        }
    }

    info!(
        "Reconciled serials {}..={}: {} rows ({} placeholders, {} anomalies)",
        min_serial,
        max_serial,
        records.len(),
        filled,
        anomalies.len()
    );

    (
        MergedTable {
            records,
            min_serial,
            max_serial,
        },
        anomalies,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: &str, name: &str) -> Record {
        Record {
            serial_no: serial.to_string(),
            house_no: "12".to_string(),
            name: name.to_string(),
            relation: "F".to_string(),
            relative_name: "Ram".to_string(),
            gender: "M".to_string(),
            age: "34".to_string(),
            photo_id: format!("ID{serial}"),
        }
    }

    fn page(position: usize, records: Vec<Record>) -> PageTable {
        let mut p = PageTable::new(position);
        p.records = records;
        p
    }

    #[test]
    fn fills_gaps_with_placeholders() {
        let pages = vec![page(1, vec![record("1", "Alice"), record("3", "Carol")])];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);

        assert!(anomalies.is_empty());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.min_serial, 1);
        assert_eq!(merged.max_serial, 3);
        assert_eq!(merged.records[0].name, "Alice");
        assert!(merged.records[1].is_placeholder());
        assert_eq!(merged.records[1].serial_no, "2");
        assert_eq!(merged.records[2].name, "Carol");
        assert_eq!(merged.placeholder_count(), 1);
    }

    #[test]
    fn length_equals_serial_span() {
        let pages = vec![
            page(1, vec![record("10", "A"), record("11", "B")]),
            page(2, vec![record("25", "Z")]),
        ];
        let (merged, _) = reconcile(&pages, DuplicatePolicy::FirstWins);
        assert_eq!(merged.len() as i64, merged.max_serial - merged.min_serial + 1);
        assert_eq!(merged.len(), 16);
    }

    #[test]
    fn first_wins_keeps_earlier_record() {
        let pages = vec![
            page(1, vec![record("5", "FromPageOne")]),
            page(2, vec![record("5", "FromPageTwo")]),
        ];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.records[0].name, "FromPageOne");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::DuplicateSerial);
        assert_eq!(anomalies[0].serial, Some(5));
        assert_eq!(anomalies[0].page, Some(2));
    }

    #[test]
    fn last_wins_keeps_later_record() {
        let pages = vec![
            page(1, vec![record("5", "FromPageOne")]),
            page(2, vec![record("5", "FromPageTwo")]),
        ];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::LastWins);

        assert_eq!(merged.records[0].name, "FromPageTwo");
        assert_eq!(anomalies.len(), 1);
    }

    #[test]
    fn non_numeric_serial_is_dropped() {
        let pages = vec![page(1, vec![record("abc", "Bad"), record("2", "Good")])];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.records[0].name, "Good");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::NonNumericSerial);
    }

    #[test]
    fn no_pages_yields_empty_table() {
        let (merged, anomalies) = reconcile(&[], DuplicatePolicy::FirstWins);
        assert!(merged.is_empty());
        assert!(anomalies.is_empty());
    }

    #[test]
    fn all_rows_invalid_yields_empty_table() {
        let pages = vec![page(1, vec![record("x", "A"), record("y", "B")])];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);
        assert!(merged.is_empty());
        assert_eq!(anomalies.len(), 2);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let pages = vec![page(1, vec![record("1", "A"), record("4", "D")])];
        let (first, _) = reconcile(&pages, DuplicatePolicy::FirstWins);

        // Feeding the merged output back in reproduces it exactly;
        // placeholders carry their serial so they survive the round trip.
        let mut refeed = PageTable::new(1);
        refeed.records = first.records.clone();
        let (second, _) = reconcile(&[refeed], DuplicatePolicy::FirstWins);

        assert_eq!(second.len(), first.len());
        assert_eq!(second.min_serial, first.min_serial);
        assert_eq!(second.max_serial, first.max_serial);
        for (a, b) in first.records.iter().zip(second.records.iter()) {
            assert_eq!(a.serial_no, b.serial_no);
            assert_eq!(a.name, b.name);
        }
    }

    #[test]
    fn absurd_serial_is_dropped_not_gap_filled() {
        // A misread twelve-digit serial must cost one row, not a
        // billion-placeholder allocation.
        let pages = vec![page(
            1,
            vec![
                record("1", "A"),
                record("2", "B"),
                record("999999999999", "Ghost"),
            ],
        )];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.min_serial, 1);
        assert_eq!(merged.max_serial, 2);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::SerialOutOfRange);
        assert_eq!(anomalies[0].serial, Some(999_999_999_999));
    }

    #[test]
    fn i64_extreme_serials_do_not_overflow() {
        let pages = vec![page(
            1,
            vec![
                record(&i64::MIN.to_string(), "Low"),
                record(&i64::MAX.to_string(), "High"),
            ],
        )];
        let (merged, anomalies) = reconcile(&pages, DuplicatePolicy::FirstWins);

        assert_eq!(merged.len(), 1);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::SerialOutOfRange);
    }

    #[test]
    fn negative_serials_are_ordered_correctly() {
        let pages = vec![page(1, vec![record("-1", "Neg"), record("1", "Pos")])];
        let (merged, _) = reconcile(&pages, DuplicatePolicy::FirstWins);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.min_serial, -1);
        assert_eq!(merged.records[0].name, "Neg");
        assert!(merged.records[1].is_placeholder());
    }
}
