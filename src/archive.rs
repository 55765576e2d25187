//! Artifact packaging: the page-image ZIP bundle and the fully quoted
//! CSV export, plus re-import of a previously produced bundle.
//!
//! ## Bundle layout
//!
//! ```text
//! super_img/image1.png          first eligible page
//! super_img/images/page2.png    remaining pages, numbered by position
//! super_img/images/page3.png
//! ```
//!
//! The first page sits apart from the rest so consumers that only need the
//! cover can fetch one well-known entry. Re-import honours the same split:
//! `image1.png` is skipped and the numbered entries are read back in
//! position order, which means a re-imported run covers pages 2 onward.
//!
//! Deflate is used for both honesty and size: PNG data barely recompresses
//! but the stored entries stay standard-tool friendly either way.
//!
//! ## CSV dialect
//!
//! Every field of every row is double-quoted, including the header, so the
//! export is byte-stable regardless of field content. Consumers that split
//! on commas naively still get eight columns.

use crate::error::ExtractError;
use crate::pipeline::encode::{encode_png, EncodedPage};
use crate::table::{MergedTable, COLUMN_HEADERS};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const FIRST_PAGE_ENTRY: &str = "super_img/image1.png";

static RE_PAGE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^super_img/images/page(\d+)\.png$").unwrap());

fn page_entry_name(position: usize) -> String {
    format!("super_img/images/page{}.png", position)
}

/// Package the page images into a deflate ZIP bundle, returned as bytes.
///
/// `pages` must be in position order; the first element becomes the
/// `image1.png` entry, the rest the numbered entries.
pub fn package_images(pages: &[EncodedPage]) -> Result<Vec<u8>, ExtractError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (i, page) in pages.iter().enumerate() {
        let name = if i == 0 {
            FIRST_PAGE_ENTRY.to_string()
        } else {
            page_entry_name(page.position)
        };
        writer
            .start_file(&name, options)
            .map_err(|e| ExtractError::PackagingFailed(format!("{}: {}", name, e)))?;
        writer
            .write_all(&page.png)
            .map_err(|e| ExtractError::PackagingFailed(format!("{}: {}", name, e)))?;
        debug!("Archived {} ({} bytes)", name, page.png.len());
    }

    let cursor = writer
        .finish()
        .map_err(|e| ExtractError::PackagingFailed(e.to_string()))?;

    let bytes = cursor.into_inner();
    info!("Image bundle: {} entries, {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

/// Serialize the merged table as fully quoted UTF-8 CSV, returned as bytes.
///
/// An empty table still produces the header row, so downstream tooling can
/// always rely on the schema being present.
pub fn package_table(table: &MergedTable) -> Result<Vec<u8>, ExtractError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(COLUMN_HEADERS)
        .map_err(|e| ExtractError::PackagingFailed(e.to_string()))?;
    for record in &table.records {
        writer
            .write_record(record.fields())
            .map_err(|e| ExtractError::PackagingFailed(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExtractError::PackagingFailed(e.to_string()))?;
    info!("CSV export: {} rows, {} bytes", table.len(), bytes.len());
    Ok(bytes)
}

/// Read a previously produced image bundle back as page sources.
///
/// The `image1.png` entry is skipped; the numbered entries are returned
/// sorted by page position, ready for the service without rasterization.
pub fn read_image_archive(path: &Path) -> Result<Vec<EncodedPage>, ExtractError> {
    let file = std::fs::File::open(path).map_err(|e| ExtractError::CorruptArchive {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::CorruptArchive {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut numbered: Vec<(usize, Vec<u8>)> = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::CorruptArchive {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let name = entry.name().to_string();
        if name == FIRST_PAGE_ENTRY {
            debug!("Skipping first-page entry {}", name);
            continue;
        }
        let position = match RE_PAGE_ENTRY
            .captures(&name)
            .and_then(|c| c[1].parse::<usize>().ok())
        {
            Some(n) => n,
            None => {
                debug!("Ignoring unrecognised entry {}", name);
                continue;
            }
        };

        let mut png = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut png)
            .map_err(|e| ExtractError::CorruptArchive {
                path: path.to_path_buf(),
                detail: format!("{}: {}", name, e),
            })?;
        numbered.push((position, png));
    }

    numbered.sort_by_key(|(position, _)| *position);

    info!(
        "Image bundle re-imported: {} page entries from {}",
        numbered.len(),
        path.display()
    );

    Ok(numbered
        .into_iter()
        .map(|(position, png)| encode_png(position, position.saturating_sub(1), png))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Record;
    use std::io::Write as _;

    fn encoded(position: usize, byte: u8) -> EncodedPage {
        encode_png(position, position - 1, vec![byte; 16])
    }

    #[test]
    fn bundle_layout_first_page_apart() {
        let pages = vec![encoded(1, 0xAA), encoded(2, 0xBB), encoded(3, 0xCC)];
        let bytes = package_images(&pages).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "super_img/image1.png",
                "super_img/images/page2.png",
                "super_img/images/page3.png",
            ]
        );
    }

    #[test]
    fn bundle_round_trip_skips_first_page() {
        let pages = vec![encoded(1, 0x01), encoded(2, 0x02), encoded(3, 0x03)];
        let bytes = package_images(&pages).unwrap();

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let reimported = read_image_archive(tmp.path()).unwrap();
        assert_eq!(reimported.len(), 2);
        assert_eq!(reimported[0].position, 2);
        assert_eq!(reimported[0].png, vec![0x02; 16]);
        assert_eq!(reimported[1].position, 3);
    }

    #[test]
    fn non_zip_file_is_corrupt_archive() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"not a zip at all").unwrap();
        let result = read_image_archive(tmp.path());
        assert!(matches!(result, Err(ExtractError::CorruptArchive { .. })));
    }

    #[test]
    fn csv_quotes_every_field() {
        let mut table = MergedTable::empty();
        table.records.push(Record::placeholder(1));
        table.records.push(Record {
            serial_no: "2".to_string(),
            house_no: "4-B".to_string(),
            name: "Kumar, Ravi".to_string(),
            relation: "F".to_string(),
            relative_name: "Raj".to_string(),
            gender: "M".to_string(),
            age: "41".to_string(),
            photo_id: "XYZ123".to_string(),
        });
        table.min_serial = 1;
        table.max_serial = 2;

        let bytes = package_table(&table).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            r#""serial_no","house_no","name","relation","relative_name","gender","age","photo_id""#
        );
        assert_eq!(lines.next().unwrap(), r#""1","","","","","","","""#);
        // The embedded comma stays inside its quotes.
        assert_eq!(
            lines.next().unwrap(),
            r#""2","4-B","Kumar, Ravi","F","Raj","M","41","XYZ123""#
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_table_exports_header_only() {
        let bytes = package_table(&MergedTable::empty()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with(r#""serial_no""#));
    }

    #[test]
    fn csv_round_trips_through_reader() {
        let mut table = MergedTable::empty();
        for s in 1..=3 {
            table.records.push(Record::placeholder(s));
        }
        let bytes = package_table(&table).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(rows[0].len(), 8);
    }
}
