//! Core table types: the 8-column record schema, per-page tables, the
//! reconciled merged table, and the anomaly report entries.
//!
//! Every row of every artifact in this crate is a [`Record`]: exactly eight
//! string fields in a fixed order, with the empty string standing in for
//! null. The serial number is the primary key the reconciler orders and
//! gap-fills by; the other seven fields are carried verbatim.

use serde::{Deserialize, Serialize};

/// Number of columns in the fixed schema. A row with any other field count
/// is rejected by the normalizer and reported, never repaired.
pub const FIELD_COUNT: usize = 8;

/// Canonical column headers, in schema order. Used for the CSV export
/// header row and quoted in the extraction instruction.
pub const COLUMN_HEADERS: [&str; FIELD_COUNT] = [
    "serial_no",
    "house_no",
    "name",
    "relation",
    "relative_name",
    "gender",
    "age",
    "photo_id",
];

/// One row of the roll: eight named string fields, `""` meaning null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Primary ordering key; must parse as an integer to survive the merge.
    pub serial_no: String,
    pub house_no: String,
    pub name: String,
    /// Relationship code (e.g. F/H/M) linking `relative_name` to `name`.
    pub relation: String,
    pub relative_name: String,
    pub gender: String,
    pub age: String,
    pub photo_id: String,
}

impl Record {
    /// Build a record from exactly [`FIELD_COUNT`] fields in schema order.
    ///
    /// Returns `None` when the count is wrong — the caller decides how to
    /// report the row, this type never guesses at a repair.
    pub fn from_fields(fields: &[&str]) -> Option<Self> {
        if fields.len() != FIELD_COUNT {
            return None;
        }
        Some(Self {
            serial_no: fields[0].to_string(),
            house_no: fields[1].to_string(),
            name: fields[2].to_string(),
            relation: fields[3].to_string(),
            relative_name: fields[4].to_string(),
            gender: fields[5].to_string(),
            age: fields[6].to_string(),
            photo_id: fields[7].to_string(),
        })
    }

    /// Gap-filler row: carries the serial number, all other fields null.
    pub fn placeholder(serial: i64) -> Self {
        Self {
            serial_no: serial.to_string(),
            house_no: String::new(),
            name: String::new(),
            relation: String::new(),
            relative_name: String::new(),
            gender: String::new(),
            age: String::new(),
            photo_id: String::new(),
        }
    }

    /// True when every field except the serial number is null.
    pub fn is_placeholder(&self) -> bool {
        self.house_no.is_empty()
            && self.name.is_empty()
            && self.relation.is_empty()
            && self.relative_name.is_empty()
            && self.gender.is_empty()
            && self.age.is_empty()
            && self.photo_id.is_empty()
    }

    /// Parse the serial-number field as an integer, `None` if non-numeric.
    pub fn serial(&self) -> Option<i64> {
        self.serial_no.trim().parse::<i64>().ok()
    }

    /// Fields in schema order, for CSV serialisation.
    pub fn fields(&self) -> [&str; FIELD_COUNT] {
        [
            &self.serial_no,
            &self.house_no,
            &self.name,
            &self.relation,
            &self.relative_name,
            &self.gender,
            &self.age,
            &self.photo_id,
        ]
    }
}

/// The record set extracted from one page, rows in service-emission order.
///
/// Rows that failed the column-count check never enter `records`; they are
/// reported as [`Anomaly`] entries by the normalizer. Sorting and
/// deduplication by serial number is the reconciler's job, not this type's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTable {
    /// 1-based position within the eligible page sequence.
    pub position: usize,
    pub records: Vec<Record>,
}

impl PageTable {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            records: Vec::new(),
        }
    }
}

/// The reconciled table spanning the full detected serial-number range.
///
/// Invariant: `records.len() == (max_serial - min_serial + 1)` and record
/// `k` carries serial `min_serial + k` — either extracted data or a
/// placeholder. An empty table has no meaningful min/max.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedTable {
    pub records: Vec<Record>,
    pub min_serial: i64,
    pub max_serial: i64,
}

impl MergedTable {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            min_serial: 0,
            max_serial: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of synthesized gap-filler rows.
    pub fn placeholder_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_placeholder()).count()
    }
}

/// Why a row or page was excluded from the merged table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// The extraction service failed for the whole page.
    ServiceFailed,
    /// The page could not be rasterized.
    RenderFailed,
    /// A data row did not have exactly eight fields.
    WrongFieldCount,
    /// A record's serial-number field did not parse as an integer.
    NonNumericSerial,
    /// A record lost the duplicate-serial tie-break.
    DuplicateSerial,
    /// A record's serial would widen the merged span past the plausible
    /// maximum, so the row was dropped instead of gap-filled.
    SerialOutOfRange,
    /// A page produced no data rows at all.
    EmptyPage,
}

/// A reported, non-fatal exclusion: enough context (page, row, serial) for
/// an operator to inspect and re-run just the affected page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub message: String,
    /// 1-based eligible-page position, when attributable to one page.
    pub page: Option<usize>,
    /// 0-based data-row index within that page's raw output.
    pub row: Option<usize>,
    /// Parsed serial number, when the record had one.
    pub serial: Option<i64>,
}

impl Anomaly {
    #[must_use]
    pub fn new(kind: AnomalyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            page: None,
            row: None,
            serial: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    #[must_use]
    pub fn with_serial(mut self, serial: i64) -> Self {
        self.serial = Some(serial);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fields_rejects_wrong_count() {
        assert!(Record::from_fields(&["1", "2", "3"]).is_none());
        assert!(Record::from_fields(&["1"; 9]).is_none());
        assert!(Record::from_fields(&["1"; 8]).is_some());
    }

    #[test]
    fn placeholder_roundtrip() {
        let r = Record::placeholder(42);
        assert_eq!(r.serial(), Some(42));
        assert!(r.is_placeholder());
        assert_eq!(r.fields()[0], "42");
        assert!(r.fields()[1..].iter().all(|f| f.is_empty()));
    }

    #[test]
    fn serial_parses_with_whitespace() {
        let mut r = Record::placeholder(1);
        r.serial_no = " 17 ".to_string();
        assert_eq!(r.serial(), Some(17));
        r.serial_no = "n/a".to_string();
        assert_eq!(r.serial(), None);
    }

    #[test]
    fn anomaly_builder_attaches_context() {
        let a = Anomaly::new(AnomalyKind::DuplicateSerial, "dup")
            .with_page(3)
            .with_row(7)
            .with_serial(12);
        assert_eq!(a.page, Some(3));
        assert_eq!(a.row, Some(7));
        assert_eq!(a.serial, Some(12));
    }
}
