//! Raw cells and the coercion engine.

use super::format::{DATE_SYSTEM_1904_OFFSET, NumberFormat, serial_to_datetime};
use super::value::CellValue;

/// Content of a raw cell, as decoded from the source container.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// Empty cell (possibly styled)
    Blank,
    /// Boolean value
    Bool(bool),
    /// Error indicator, e.g. `#N/A`
    Error(String),
    /// A formula's cached numeric result. Formulas are never re-evaluated;
    /// `None` means the cached result was not numeric.
    Formula(Option<f64>),
    /// Numeric value, presentation governed by the cell's display format
    Number(f64),
    /// Text value
    Text(String),
}

/// One raw cell: content plus the display format that disambiguates how a
/// number renders (date, plain number, or integer-looking text).
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    content: CellContent,
    format: Option<NumberFormat>,
    /// Whether the owning workbook uses the 1904 date system. Captured per
    /// cell at decode time so that [`Cell::value`] stays a function of the
    /// cell alone.
    date_1904: bool,
}

impl Cell {
    /// Create a cell from raw content and an optional display format.
    pub fn new(content: CellContent, format: Option<NumberFormat>) -> Self {
        Self {
            content,
            format,
            date_1904: false,
        }
    }

    /// Tag the cell with the workbook's date-system flag.
    pub fn with_date_system(mut self, date_1904: bool) -> Self {
        self.date_1904 = date_1904;
        self
    }

    /// An empty cell.
    pub fn blank() -> Self {
        Self::new(CellContent::Blank, None)
    }

    /// A boolean cell.
    pub fn boolean(value: bool) -> Self {
        Self::new(CellContent::Bool(value), None)
    }

    /// An error cell carrying the raw error indicator.
    pub fn error(code: impl Into<String>) -> Self {
        Self::new(CellContent::Error(code.into()), None)
    }

    /// A formula cell with its cached numeric result, if any.
    pub fn formula(cached: Option<f64>) -> Self {
        Self::new(CellContent::Formula(cached), None)
    }

    /// A numeric cell with the generic default format.
    pub fn number(value: f64) -> Self {
        Self::new(CellContent::Number(value), None)
    }

    /// A numeric cell with an explicit display format.
    pub fn number_with_format(value: f64, format: NumberFormat) -> Self {
        Self::new(CellContent::Number(value), Some(format))
    }

    /// A text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(CellContent::Text(value.into()), None)
    }

    /// The raw content.
    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// The numeric display format, if one was attached.
    pub fn format(&self) -> Option<&NumberFormat> {
        self.format.as_ref()
    }

    /// Coerce this cell to its canonical value.
    ///
    /// Total and deterministic: every cell maps to exactly one
    /// [`CellValue`], and identical cells always map to the same one.
    pub fn value(&self) -> CellValue {
        match &self.content {
            CellContent::Blank => CellValue::Null,
            CellContent::Bool(b) => CellValue::Bool(*b),
            CellContent::Error(code) => CellValue::Error(code.clone()),
            CellContent::Formula(cached) => match cached {
                Some(n) => CellValue::Number(*n),
                None => CellValue::Null,
            },
            CellContent::Number(n) => self.coerce_number(*n),
            CellContent::Text(s) => {
                if s.trim().is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(s.clone())
                }
            }
        }
    }

    fn coerce_number(&self, n: f64) -> CellValue {
        if let Some(format) = &self.format {
            if format.is_date() {
                let serial = if self.date_1904 {
                    n + DATE_SYSTEM_1904_OFFSET as f64
                } else {
                    n
                };
                return match serial_to_datetime(serial) {
                    Some(ts) => CellValue::DateTime(ts),
                    None => CellValue::Null,
                };
            }
            if !format.is_general_or_text() {
                return CellValue::Number(n);
            }
        }
        // General or "@": render with zero decimal places so integer-looking
        // identifiers (long account numbers) survive as exact text instead of
        // picking up floating-point noise.
        let rendered = format!("{n:.0}");
        if rendered.trim().is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(rendered)
        }
    }
}

/// Convert a zero-based column index to spreadsheet letters
/// (0 -> "A", 25 -> "Z", 26 -> "AA").
pub(crate) fn column_letters(index: u32) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parse an A1-style reference (e.g. "BC23") into zero-based
/// (row, column). Returns `None` for malformed references.
pub(crate) fn parse_reference(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut column = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, column - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[test]
    fn blank_and_empty_text_coerce_to_null() {
        assert_eq!(Cell::blank().value(), CellValue::Null);
        assert_eq!(Cell::text("").value(), CellValue::Null);
        assert_eq!(Cell::text("   \t").value(), CellValue::Null);
        assert_eq!(Cell::text(" x ").value(), CellValue::Text(" x ".into()));
    }

    #[test]
    fn general_format_renders_integers_as_text() {
        let general = Cell::number_with_format(1234.0, NumberFormat::general());
        assert_eq!(general.value(), CellValue::Text("1234".into()));

        let text_marker = Cell::number_with_format(1234.0, NumberFormat::new(49, "@"));
        assert_eq!(text_marker.value(), CellValue::Text("1234".into()));

        // an unformatted numeric cell behaves like General
        assert_eq!(Cell::number(1234.0).value(), CellValue::Text("1234".into()));

        // long identifiers survive exactly instead of going scientific
        let id = Cell::number(1234567890123456.0);
        assert_eq!(id.value(), CellValue::Text("1234567890123456".into()));
    }

    #[test]
    fn real_numeric_formats_keep_the_number() {
        let cell = Cell::number_with_format(1234.0, NumberFormat::new(2, "0.00"));
        assert_eq!(cell.value(), CellValue::Number(1234.0));

        let pct = Cell::number_with_format(0.25, NumberFormat::new(10, "0.00%"));
        assert_eq!(pct.value(), CellValue::Number(0.25));
    }

    #[test]
    fn date_formats_produce_timestamps() {
        let cell = Cell::number_with_format(45_000.0, NumberFormat::new(14, "mm-dd-yy"));
        let expected = NaiveDate::from_ymd_opt(2023, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell.value(), CellValue::DateTime(expected));
    }

    #[test]
    fn the_1904_flag_shifts_date_serials() {
        let cell = Cell::number_with_format(0.0, NumberFormat::new(14, "mm-dd-yy"))
            .with_date_system(true);
        let CellValue::DateTime(ts) = cell.value() else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(1904, 1, 1).unwrap());
    }

    #[test]
    fn formulas_yield_only_their_cached_numeric_result() {
        assert_eq!(Cell::formula(Some(6.5)).value(), CellValue::Number(6.5));
        // textual/boolean cached results degrade to Null rather than failing
        assert_eq!(Cell::formula(None).value(), CellValue::Null);
    }

    #[test]
    fn booleans_and_errors_pass_through() {
        assert_eq!(Cell::boolean(true).value(), CellValue::Bool(true));
        assert_eq!(
            Cell::error("#DIV/0!").value(),
            CellValue::Error("#DIV/0!".into())
        );
    }

    #[test]
    fn column_letters_round_trip() {
        for col in 0..1000 {
            let reference = format!("{}1", column_letters(col));
            assert_eq!(parse_reference(&reference), Some((0, col)));
        }
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
        assert_eq!(parse_reference("A0"), None);
        assert_eq!(parse_reference("12"), None);
        assert_eq!(parse_reference(""), None);
    }

    proptest! {
        // coercion is total: any number under any format yields a value
        #[test]
        fn coercion_is_total(n in proptest::num::f64::ANY, code in "[ -~]{0,12}") {
            let _ = Cell::number_with_format(n, NumberFormat::new(200, code)).value();
            let _ = Cell::number(n).value();
            let _ = Cell::formula(Some(n)).value();
        }
    }
}
