//! The canonical value domain exchanged between the engine and callers.

use std::fmt;

use chrono::NaiveDateTime;

/// Canonical representation of one cell's content after coercion.
///
/// A structurally blank cell, or a text cell whose trimmed content is
/// empty, is always [`CellValue::Null`] - never an empty-string `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// Floating point number
    Number(f64),
    /// Calendar timestamp, timezone-free
    DateTime(NaiveDateTime),
    /// Text value
    Text(String),
    /// Error marker carried over from the source cell (e.g. `#DIV/0!`)
    Error(String),
}

impl CellValue {
    /// Whether this is the absent value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::DateTime(ts) => write!(f, "{ts}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Error(code) => f.write_str(code),
        }
    }
}
