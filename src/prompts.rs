//! The fixed extraction instruction sent with every page image.
//!
//! Centralising the instruction here serves two purposes:
//!
//! 1. **Single source of truth** — the output contract (column set, quoting
//!    rules, null convention) is stated in exactly one place, next to the
//!    schema constants it must agree with.
//!
//! 2. **Testability** — unit tests can assert the instruction and
//!    [`crate::table::COLUMN_HEADERS`] never drift apart without calling a
//!    real service.
//!
//! The continuity and null-filling clauses below are a *request* to a
//! non-deterministic collaborator, not a guarantee: the reconciler
//! re-derives gap-filling and duplicate resolution from scratch regardless
//! of what the service claims to have done.

/// Default instruction for extracting the roll table from one page image.
///
/// Used when `ExtractionConfig::instruction` is `None`.
pub const EXTRACTION_INSTRUCTION: &str = r#"You are a precise data-entry operator. The image is one page of a scanned enrollment roll. Transcribe every entry on the page into CSV.

Follow these rules precisely:

1. COLUMNS
   - Output exactly 8 columns in this order:
     serial_no, house_no, name, relation, relative_name, gender, age, photo_id
   - The first row must be exactly this header row and nothing else.

2. QUOTING
   - Double-quote every field, including the header fields.
   - Separate fields with commas, one record per line.

3. NULLS
   - If a value is missing or illegible, output an empty quoted string: "".
   - Never invent values and never leave a field out.

4. CONTINUITY
   - Serial numbers on a page run consecutively. If a serial number in the
     page's range has no readable entry, still emit its row with the serial
     number filled in and every other field as "".

5. OUTPUT FORMAT
   - Output ONLY the CSV block.
   - Do NOT wrap it in ``` fences.
   - Do NOT add commentary, summaries, or page markers."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::COLUMN_HEADERS;

    #[test]
    fn instruction_names_every_column_in_order() {
        // The instruction and the schema constants must not drift apart.
        let joined = COLUMN_HEADERS.join(", ");
        assert!(
            EXTRACTION_INSTRUCTION.contains(&joined),
            "instruction must list the canonical columns: {joined}"
        );
    }

    #[test]
    fn instruction_forbids_wrapper_text() {
        assert!(EXTRACTION_INSTRUCTION.contains("ONLY the CSV block"));
        assert!(EXTRACTION_INSTRUCTION.contains("fences"));
    }
}
