//! Rowbook - convert spreadsheet workbooks to and from record collections.
//!
//! This library reads tabular spreadsheet documents into canonical typed
//! values and writes collections of records out as spreadsheet artifacts.
//! Two container families are supported, selected by a file-extension hint:
//! the OOXML package (`"xlsx"`) and the legacy binary workbook (`"xls"`).
//!
//! # Example - Reading a workbook
//!
//! ```no_run
//! use rowbook::decode;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("report.xlsx")?;
//! let workbook = decode(&bytes, "xlsx")?;
//!
//! // Whole first sheet, blank rows elided
//! let rows = workbook.sheet_values(0)?;
//! for row in &rows {
//!     println!("{row:?}");
//! }
//!
//! // A row/column window, half-open on both axes
//! let window = workbook.sheet_range("Prices", 1..20, 0..4)?;
//! assert!(window.iter().all(|row| row.len() == 4));
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Exporting records
//!
//! ```no_run
//! use rowbook::{export, Field, Record};
//! use std::collections::BTreeMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut row = BTreeMap::new();
//! row.insert("name".to_string(), Field::from("Ada"));
//! row.insert("age".to_string(), Field::from(36));
//!
//! let out = std::fs::File::create("people.xlsx")?;
//! export(&["name", "age"], vec![Record::Map(row)], "xlsx", out, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! Exports with the `"xlsx"` hint go through a row-windowed streaming writer
//! that keeps at most [`ooxml::writer::ROW_WINDOW`] rows of a sheet resident,
//! so datasets of hundreds of thousands of rows stay within bounded memory.
//! The `"xls"` writer buffers every sheet and is unsuitable for very large
//! datasets.

/// Shared infrastructure: error and result types.
pub mod common;

/// Record shapes, the row serializer, and the export orchestrator.
pub mod export;

/// Format-hint dispatch and the export workbook variants.
pub mod factory;

/// Legacy binary (`.xls`) codec: CFB container plus BIFF8 records.
pub mod ole;

/// OOXML (`.xlsx`) codec: ZIP package plus SpreadsheetML parts.
pub mod ooxml;

/// The workbook data model, cell coercion, and range-bounded reading.
pub mod sheet;

pub use common::{Error, Result};
pub use export::{Field, FieldSource, Record, SheetData, export, export_sheets};
pub use factory::{ExportBook, WriteCell, decode, export_book, open_path};
pub use sheet::{
    Cell, CellContent, CellValue, NumberFormat, Row, Sheet, SheetSelector, Workbook,
};
