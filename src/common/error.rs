//! Unified error type.
//!
//! Recoverable export conditions (missing mapping keys, failed record
//! fields, truncated text) are not errors; they are reported through the
//! `log` facade at their site and the export continues.

use thiserror::Error;

/// Main error type for workbook operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file-extension hint names no supported container family.
    #[error("unsupported file extension `{0}`")]
    UnsupportedFormat(String),

    /// A requested row window reaches past the sheet's physical rows.
    #[error("row range end {end} exceeds the sheet's physical row count {count}")]
    RowRangeOutOfBounds { end: u32, count: u32 },

    /// A requested column window reaches past the first row's physical cells.
    #[error("column range end {end} exceeds the first row's physical column count {count}")]
    ColumnRangeOutOfBounds { end: u32, count: u32 },

    /// Sheet lookup by position failed; unlike an absent sheet name, an
    /// out-of-range index is a caller error.
    #[error("no sheet at index {0}")]
    SheetIndex(usize),

    /// A sheet with this name was already added to the export workbook.
    #[error("sheet `{0}` already exists")]
    SheetExists(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// A required workbook part is missing or malformed.
    #[error("corrupted workbook: {0}")]
    Corrupted(String),

    /// Legacy (BIFF/CFB) workbook error
    #[error("legacy workbook error: {0}")]
    Legacy(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Error::Io(io),
            other => Error::Zip(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(e.to_string())
    }
}

/// Result type for workbook operations.
pub type Result<T> = std::result::Result<T, Error>;
