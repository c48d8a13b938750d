//! Polymorphic row serialization.
//!
//! One record becomes one row of cell writes. Failures stay local: a
//! missing mapping key or a failed record field costs that cell, never the
//! row or the export.

use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use log::{error, warn};

use crate::common::Result;
use crate::factory::{ExportBook, WriteCell};

use super::record::{Field, Record};

/// Write the header row, every record, and the sized column band.
pub(crate) fn write_sheet(
    book: &mut ExportBook,
    sheet: usize,
    headers: &[String],
    records: impl IntoIterator<Item = Record>,
    date_pattern: Option<&str>,
) -> Result<()> {
    let max_text = book.max_text_len();
    let mut widths: Vec<u16> = headers.iter().map(|h| display_width(h)).collect();

    let header_cells: Vec<WriteCell> = headers
        .iter()
        .map(|h| WriteCell::Text(clip_text(h.clone(), max_text)))
        .collect();
    book.append_row(sheet, &header_cells)?;

    for record in records {
        let cells = encode_record(record, headers, date_pattern, max_text);
        track_widths(&mut widths, &cells);
        book.append_row(sheet, &cells)?;
    }

    // sized to the header count: rows may be wider or narrower, the header
    // band stays stable
    widths.truncate(headers.len());
    book.set_column_widths(sheet, &widths)?;
    Ok(())
}

/// Write plain text rows (no headers, no record dispatch), sizing columns
/// to the first row.
pub(crate) fn write_text_rows(
    book: &mut ExportBook,
    sheet: usize,
    rows: Vec<Vec<String>>,
) -> Result<()> {
    let max_text = book.max_text_len();
    let band = rows.first().map(Vec::len).unwrap_or(0);
    let mut widths = vec![0u16; band];

    for row in rows {
        let cells: Vec<WriteCell> = row
            .into_iter()
            .map(|text| WriteCell::Text(clip_text(text, max_text)))
            .collect();
        track_widths(&mut widths, &cells);
        book.append_row(sheet, &cells)?;
    }
    widths.truncate(band);
    book.set_column_widths(sheet, &widths)?;
    Ok(())
}

/// Dispatch once on the record's shape.
fn encode_record(
    record: Record,
    headers: &[String],
    date_pattern: Option<&str>,
    max_text: usize,
) -> Vec<WriteCell> {
    match record {
        Record::Map(map) => headers
            .iter()
            .map(|header| match map.get(header) {
                Some(field) => WriteCell::Text(clip_text(field.to_string(), max_text)),
                None => {
                    warn!("mapping record has no key `{header}`; leaving the column unset");
                    WriteCell::Blank
                }
            })
            .collect(),
        Record::Seq(fields) => fields
            .into_iter()
            .map(|field| WriteCell::Text(clip_text(field.to_string(), max_text)))
            .collect(),
        Record::Struct(source) => source
            .fields()
            .into_iter()
            .map(|(name, outcome)| match outcome {
                Ok(field) => encode_typed(&name, field, date_pattern, max_text),
                Err(reason) => {
                    error!("record field `{name}` failed: {reason}; leaving the cell empty");
                    WriteCell::Blank
                }
            })
            .collect(),
    }
}

/// Structured-record fields keep their runtime type in the cell.
fn encode_typed(
    name: &str,
    field: Field,
    date_pattern: Option<&str>,
    max_text: usize,
) -> WriteCell {
    match field {
        Field::Null => WriteCell::Text(String::new()),
        Field::Bool(b) => WriteCell::Bool(b),
        Field::Int(i) => WriteCell::Number(i as f64),
        Field::Float(n) => WriteCell::Number(n),
        Field::Text(s) => WriteCell::Text(clip_text(s, max_text)),
        Field::DateTime(ts) => match format_datetime(ts, date_pattern) {
            Ok(text) => WriteCell::Text(clip_text(text, max_text)),
            Err(reason) => {
                error!("record field `{name}` failed: {reason}; leaving the cell empty");
                WriteCell::Blank
            }
        },
    }
}

/// Render a timestamp with the caller's pattern. A missing or invalid
/// pattern is an error to report, never a silent default.
fn format_datetime(
    ts: NaiveDateTime,
    pattern: Option<&str>,
) -> std::result::Result<String, String> {
    let Some(pattern) = pattern else {
        return Err("no date pattern supplied for a datetime field".to_string());
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date pattern `{pattern}`"));
    }
    Ok(ts.format_with_items(items.into_iter()).to_string())
}

fn track_widths(widths: &mut Vec<u16>, cells: &[WriteCell]) {
    for (index, cell) in cells.iter().enumerate() {
        let width = match cell {
            WriteCell::Blank => 0,
            WriteCell::Bool(_) => 5,
            WriteCell::Number(n) => n.to_string().chars().count().min(255) as u16,
            WriteCell::Text(s) => display_width(s),
        };
        if index >= widths.len() {
            widths.push(width);
        } else if widths[index] < width {
            widths[index] = width;
        }
    }
}

fn display_width(text: &str) -> u16 {
    text.chars().count().min(255) as u16
}

/// Clip text to the target format's cell limit, reporting the truncation.
pub(crate) fn clip_text(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    warn!("cell text exceeds {max} characters; truncating");
    text.chars().take(max).collect()
}
