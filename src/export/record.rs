//! Row records: the shapes a caller's rows may take, and their scalar
//! fields.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

/// One exportable scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Absent value; serialized as an empty cell
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Timestamp, rendered with the export's date pattern
    DateTime(NaiveDateTime),
}

impl Field {
    /// Whether this is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => Ok(()),
            Field::Bool(b) => write!(f, "{b}"),
            Field::Int(i) => write!(f, "{i}"),
            Field::Float(n) => write!(f, "{n}"),
            Field::Text(s) => f.write_str(s),
            Field::DateTime(ts) => write!(f, "{ts}"),
        }
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Field::Bool(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v.into())
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Int(v)
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Field::Float(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::Text(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::Text(v)
    }
}

impl From<NaiveDateTime> for Field {
    fn from(v: NaiveDateTime) -> Self {
        Field::DateTime(v)
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(value) => value.into(),
            None => Field::Null,
        }
    }
}

/// Why a structured-record field could not be produced.
#[derive(Debug, Clone)]
pub struct FieldError(pub String);

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FieldError {}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        FieldError(message.to_string())
    }
}

/// Outcome of reading one structured-record field.
pub type FieldResult = std::result::Result<Field, FieldError>;

/// Capability interface for structured records: the declared fields, in
/// declaration order, each with its accessor's outcome. A failed accessor
/// costs that field its cell, never the row.
pub trait FieldSource {
    /// The record's fields as ordered `(name, outcome)` pairs.
    fn fields(&self) -> Vec<(String, FieldResult)>;
}

/// One logical record, polymorphic over the caller's row representation.
///
/// A closed set of shapes, dispatched once per row by the serializer.
pub enum Record {
    /// Keyed mapping; each value is written at its header's column.
    Map(BTreeMap<String, Field>),
    /// Positional values, written index-for-index with no dependency on
    /// the header count.
    Seq(Vec<Field>),
    /// Structured record, serialized through its [`FieldSource`]
    /// capability with per-type cell encoding.
    Struct(Box<dyn FieldSource>),
}

impl Record {
    /// Wrap a structured record.
    pub fn from_struct(source: impl FieldSource + 'static) -> Self {
        Record::Struct(Box::new(source))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Record::Seq(fields) => f.debug_tuple("Seq").field(fields).finish(),
            Record::Struct(_) => f.write_str("Struct(..)"),
        }
    }
}

impl From<BTreeMap<String, Field>> for Record {
    fn from(map: BTreeMap<String, Field>) -> Self {
        Record::Map(map)
    }
}

impl From<Vec<Field>> for Record {
    fn from(fields: Vec<Field>) -> Self {
        Record::Seq(fields)
    }
}
