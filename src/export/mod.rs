//! Export of record collections as spreadsheet workbooks.

mod record;
mod serializer;

pub use record::{Field, FieldError, FieldResult, FieldSource, Record};

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use crate::common::Result;
use crate::factory;

/// Date pattern applied when the caller supplies none.
pub const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d";

/// A named dataset: one sheet's name, ordered headers, and records.
///
/// Constructed by the caller and consumed once by
/// [`export_sheets`]; the engine never mutates it.
pub struct SheetData {
    /// Sheet name
    pub name: String,
    /// Column headers, written verbatim as the first row
    pub headers: Vec<String>,
    /// Records, one row each
    pub records: Vec<Record>,
}

impl SheetData {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, headers: &[&str], records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            records,
        }
    }
}

/// Export one dataset as a single-sheet workbook.
///
/// `date_pattern` is a chrono `strftime` pattern applied to datetime fields
/// of structured records; it defaults to [`DEFAULT_DATE_PATTERN`].
pub fn export<W: Write + Seek>(
    headers: &[&str],
    records: Vec<Record>,
    extension: &str,
    out: W,
    date_pattern: Option<&str>,
) -> Result<()> {
    export_sheets(
        vec![SheetData::new("Sheet1", headers, records)],
        extension,
        out,
        date_pattern,
    )
}

/// Export named datasets, one sheet per dataset, in caller order.
///
/// An empty dataset list is a no-op: nothing is written and no artifact is
/// produced.
pub fn export_sheets<W: Write + Seek>(
    sheets: Vec<SheetData>,
    extension: &str,
    out: W,
    date_pattern: Option<&str>,
) -> Result<()> {
    if sheets.is_empty() {
        return Ok(());
    }
    let pattern = date_pattern.unwrap_or(DEFAULT_DATE_PATTERN);
    let mut book = factory::export_book(extension)?;
    for data in sheets {
        let sheet = book.add_sheet(&data.name)?;
        serializer::write_sheet(&mut book, sheet, &data.headers, data.records, Some(pattern))?;
    }
    book.finish(out)
}

/// Export rows of plain text with no record semantics and no header row.
/// Columns are sized to the first row's width.
pub fn export_rows<W: Write + Seek>(
    rows: Vec<Vec<String>>,
    extension: &str,
    out: W,
) -> Result<()> {
    let mut book = factory::export_book(extension)?;
    let sheet = book.add_sheet("Sheet1")?;
    serializer::write_text_rows(&mut book, sheet, rows)?;
    book.finish(out)
}

/// Export a single dataset to a file path, taking the format hint from the
/// path's extension.
pub fn export_to_path(
    headers: &[&str],
    records: Vec<Record>,
    path: impl AsRef<Path>,
    date_pattern: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    let extension = extension_of(path);
    let file = File::create(path)?;
    export(headers, records, &extension, file, date_pattern)
}

/// Export named datasets to a file path, taking the format hint from the
/// path's extension.
pub fn export_sheets_to_path(
    sheets: Vec<SheetData>,
    path: impl AsRef<Path>,
    date_pattern: Option<&str>,
) -> Result<()> {
    if sheets.is_empty() {
        return Ok(());
    }
    let path = path.as_ref();
    let extension = extension_of(path);
    let file = File::create(path)?;
    export_sheets(sheets, &extension, file, date_pattern)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}
