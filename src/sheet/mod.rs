//! Workbook data model, cell coercion, and range-bounded reading.

mod cell;
mod format;
mod model;
mod range;
mod value;

pub use cell::{Cell, CellContent};
pub use format::{NumberFormat, is_date_format, serial_to_datetime};
pub use model::{Row, Sheet, SheetSelector, Workbook};
pub use value::CellValue;

pub(crate) use cell::{column_letters, parse_reference};
pub(crate) use format::builtin_format_code;
