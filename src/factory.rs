//! Format-hint dispatch and the export workbook variants.
//!
//! Dispatch is purely on the literal extension hint; bytes are never
//! sniffed. Two hints are recognized, one per container family.

use std::io::{Seek, Write};
use std::path::Path;

use crate::common::{Error, Result};
use crate::ole;
use crate::ooxml;
use crate::sheet::Workbook;

/// Extension hint for the legacy binary family.
pub const LEGACY_EXTENSION: &str = "xls";

/// Extension hint for the OOXML family.
pub const OOXML_EXTENSION: &str = "xlsx";

/// Decode workbook bytes according to the file-extension hint.
pub fn decode(bytes: &[u8], extension: &str) -> Result<Workbook> {
    match extension {
        LEGACY_EXTENSION => ole::reader::decode(bytes),
        OOXML_EXTENSION => ooxml::reader::decode(bytes),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

/// Open a workbook from a file path, taking the hint from the extension.
pub fn open_path(path: impl AsRef<Path>) -> Result<Workbook> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let bytes = std::fs::read(path)?;
    decode(&bytes, &extension)
}

/// One cell write queued by the row serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCell {
    /// Empty cell
    Blank,
    /// Numeric cell
    Number(f64),
    /// Boolean cell
    Bool(bool),
    /// Text cell
    Text(String),
}

/// The two write-time workbook variants.
///
/// Both share one contract (sheets, appended rows, column widths, a final
/// encode). The streaming variant bounds memory by keeping only a window of
/// recent rows resident; the buffered variant materializes everything,
/// because its container format cannot flush incrementally, and is
/// unsuitable for very large datasets.
pub enum ExportBook {
    /// Row-windowed streaming writer (OOXML family)
    Streaming(ooxml::writer::XlsxBookWriter),
    /// Fully-buffered writer (legacy family)
    Buffered(ole::writer::XlsBookWriter),
}

/// Select the writer variant for an extension hint: `"xlsx"` streams with a
/// bounded row window, `"xls"` buffers.
pub fn export_book(extension: &str) -> Result<ExportBook> {
    match extension {
        LEGACY_EXTENSION => Ok(ExportBook::Buffered(ole::writer::XlsBookWriter::new())),
        OOXML_EXTENSION => Ok(ExportBook::Streaming(ooxml::writer::XlsxBookWriter::new())),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

impl ExportBook {
    /// Add a sheet and get its handle. Sheet names are unique per workbook.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        match self {
            ExportBook::Streaming(writer) => writer.add_sheet(name),
            ExportBook::Buffered(writer) => writer.add_sheet(name),
        }
    }

    /// Append one row of cells to a sheet.
    pub fn append_row(&mut self, sheet: usize, cells: &[WriteCell]) -> Result<()> {
        match self {
            ExportBook::Streaming(writer) => writer.append_row(sheet, cells),
            ExportBook::Buffered(writer) => writer.append_row(sheet, cells),
        }
    }

    /// Set the sized column band for a sheet, one width (in characters) per
    /// column starting at the first.
    pub fn set_column_widths(&mut self, sheet: usize, widths: &[u16]) -> Result<()> {
        match self {
            ExportBook::Streaming(writer) => writer.set_column_widths(sheet, widths),
            ExportBook::Buffered(writer) => writer.set_column_widths(sheet, widths),
        }
    }

    /// Longest text the target format stores in one cell.
    pub fn max_text_len(&self) -> usize {
        match self {
            ExportBook::Streaming(writer) => writer.max_text_len(),
            ExportBook::Buffered(writer) => writer.max_text_len(),
        }
    }

    /// Encode the workbook into `out`.
    pub fn finish<W: Write + Seek>(self, out: W) -> Result<()> {
        match self {
            ExportBook::Streaming(writer) => writer.finish(out),
            ExportBook::Buffered(writer) => writer.finish(out),
        }
    }
}
