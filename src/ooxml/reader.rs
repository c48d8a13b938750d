//! Decoder for the OOXML spreadsheet package.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::common::{Error, Result};
use crate::sheet::{
    Cell, CellContent, NumberFormat, Sheet, Workbook, builtin_format_code, parse_reference,
};

/// Decode an OOXML workbook from raw bytes.
pub fn decode(bytes: &[u8]) -> Result<Workbook> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| Error::Corrupted("missing xl/workbook.xml".into()))?;
    let (sheet_refs, date_1904) = parse_workbook_xml(&workbook_xml)?;

    let relationships = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let styles = match read_part(&mut archive, "xl/styles.xml")? {
        Some(xml) => parse_styles(&xml)?,
        None => Styles::default(),
    };

    let mut workbook = Workbook::new();
    for (index, sheet_ref) in sheet_refs.iter().enumerate() {
        let path = relationships
            .get(&sheet_ref.relationship_id)
            .map(|target| resolve_part_path(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));
        let sheet_xml = read_part(&mut archive, &path)?
            .ok_or_else(|| Error::Corrupted(format!("missing worksheet part {path}")))?;
        workbook.push_sheet(parse_worksheet(
            &sheet_xml,
            &sheet_ref.name,
            &shared,
            &styles,
            date_1904,
        )?);
    }
    Ok(workbook)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut content = String::new();
            part.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct SheetRef {
    name: String,
    relationship_id: String,
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// The `r:id` attribute, tolerant of the relationship namespace prefix.
fn relationship_id(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"r:id" || key.ends_with(b":id") {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_workbook_xml(xml: &str) -> Result<(Vec<SheetRef>, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut date_1904 = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"workbookPr" => {
                        if let Some(flag) = attr_value(e, b"date1904")? {
                            date_1904 = flag == "1" || flag == "true";
                        }
                    }
                    b"sheet" => {
                        let name = attr_value(e, b"name")?.unwrap_or_default();
                        let relationship_id = relationship_id(e)?.unwrap_or_default();
                        sheets.push(SheetRef {
                            name,
                            relationship_id,
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok((sheets, date_1904))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Relationship"
                    && let (Some(id), Some(target)) =
                        (attr_value(e, b"Id")?, attr_value(e, b"Target")?)
                {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Resolve a workbook-relative relationship target to a package path.
fn resolve_part_path(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    let base = if trimmed.starts_with("xl/") {
        trimmed.to_string()
    } else {
        format!("xl/{trimmed}")
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Shared strings, in table order. Rich-text runs are concatenated;
/// phonetic runs are skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Ok(Event::Text(ref t)) if in_text => {
                current.push_str(&t.unescape()?);
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Style table: custom number formats plus the cell-XF format bindings.
#[derive(Debug, Default)]
pub(crate) struct Styles {
    custom_formats: HashMap<u32, String>,
    cell_xf_format_ids: Vec<u32>,
}

impl Styles {
    /// The display format bound to a cell style index.
    fn format_for(&self, style: usize) -> Option<NumberFormat> {
        let id = *self.cell_xf_format_ids.get(style)?;
        let code = self
            .custom_formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_format_code(id).map(str::to_string))
            .unwrap_or_else(|| "General".to_string());
        Some(NumberFormat::new(id, code))
    }
}

fn parse_styles(xml: &str) -> Result<Styles> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut styles = Styles::default();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"numFmt" => {
                        if let (Some(id), Some(code)) = (
                            attr_value(e, b"numFmtId")?,
                            attr_value(e, b"formatCode")?,
                        ) && let Ok(id) = id.parse::<u32>()
                        {
                            styles.custom_formats.insert(id, code);
                        }
                    }
                    b"cellXfs" => in_cell_xfs = true,
                    b"xf" if in_cell_xfs => {
                        let id = attr_value(e, b"numFmtId")?
                            .and_then(|v| v.parse::<u32>().ok())
                            .unwrap_or(0);
                        styles.cell_xf_format_ids.push(id);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(styles)
}

#[derive(Default)]
struct PendingCell {
    reference: Option<String>,
    cell_type: Option<String>,
    style: Option<usize>,
    has_formula: bool,
    value: Option<String>,
    inline: Option<String>,
}

impl PendingCell {
    fn from_attrs(e: &BytesStart<'_>) -> Result<Self> {
        Ok(Self {
            reference: attr_value(e, b"r")?,
            cell_type: attr_value(e, b"t")?,
            style: attr_value(e, b"s")?.and_then(|s| s.parse().ok()),
            ..Self::default()
        })
    }
}

/// What the current text event belongs to.
enum Capture {
    Idle,
    Value,
    Formula,
    Inline,
}

fn parse_worksheet(
    xml: &str,
    name: &str,
    shared: &[String],
    styles: &Styles,
    date_1904: bool,
) -> Result<Sheet> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheet = Sheet::new(name);

    let mut row_index = 0u32;
    let mut seen_row = false;
    let mut next_column = 0u32;
    let mut pending: Option<PendingCell> = None;
    let mut capture = Capture::Idle;
    let mut in_inline = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    (row_index, seen_row) = next_row_index(e, row_index, seen_row)?;
                    next_column = 0;
                }
                b"c" => pending = Some(PendingCell::from_attrs(e)?),
                b"v" if pending.is_some() => capture = Capture::Value,
                b"f" => {
                    if let Some(cell) = pending.as_mut() {
                        cell.has_formula = true;
                    }
                    capture = Capture::Formula;
                }
                b"is" => in_inline = true,
                b"rPh" => in_phonetic = true,
                b"t" if in_inline && !in_phonetic => capture = Capture::Inline,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    (row_index, seen_row) = next_row_index(e, row_index, seen_row)?;
                    next_column = 0;
                }
                b"c" => {
                    let cell = PendingCell::from_attrs(e)?;
                    next_column = store_cell(
                        &mut sheet, cell, row_index, next_column, shared, styles, date_1904,
                    )?;
                }
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if let Some(cell) = pending.as_mut() {
                    match capture {
                        Capture::Value => {
                            cell.value.get_or_insert_with(String::new).push_str(&t.unescape()?)
                        }
                        Capture::Inline => {
                            cell.inline.get_or_insert_with(String::new).push_str(&t.unescape()?)
                        }
                        Capture::Formula | Capture::Idle => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"f" | b"t" => capture = Capture::Idle,
                b"is" => in_inline = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        next_column = store_cell(
                            &mut sheet, cell, row_index, next_column, shared, styles, date_1904,
                        )?;
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheet)
}

fn next_row_index(e: &BytesStart<'_>, current: u32, seen_row: bool) -> Result<(u32, bool)> {
    let index = match attr_value(e, b"r")?.and_then(|r| r.parse::<u32>().ok()) {
        Some(number) if number > 0 => number - 1,
        _ if seen_row => current + 1,
        _ => 0,
    };
    Ok((index, true))
}

/// Build the raw cell and place it; returns the column index after it.
fn store_cell(
    sheet: &mut Sheet,
    cell: PendingCell,
    row_index: u32,
    next_column: u32,
    shared: &[String],
    styles: &Styles,
    date_1904: bool,
) -> Result<u32> {
    let column = cell
        .reference
        .as_deref()
        .and_then(parse_reference)
        .map(|(_, col)| col)
        .unwrap_or(next_column);

    let content = if cell.has_formula {
        // only the cached numeric result is kept; formulas are not evaluated
        CellContent::Formula(cell.value.as_deref().and_then(|v| v.parse().ok()))
    } else {
        match cell.cell_type.as_deref() {
            Some("s") => match cell.value.as_deref() {
                None => CellContent::Blank,
                Some(raw) => {
                    let index: usize = raw.trim().parse().map_err(|_| {
                        Error::Corrupted("malformed shared string index".into())
                    })?;
                    let text = shared.get(index).ok_or_else(|| {
                        Error::Corrupted(format!("shared string index {index} out of range"))
                    })?;
                    CellContent::Text(text.clone())
                }
            },
            Some("b") => CellContent::Bool(cell.value.as_deref() == Some("1")),
            Some("e") => CellContent::Error(cell.value.unwrap_or_default()),
            Some("inlineStr") => CellContent::Text(cell.inline.unwrap_or_default()),
            Some("str") => CellContent::Text(cell.value.unwrap_or_default()),
            _ => match cell.value {
                Some(raw) => match raw.trim().parse::<f64>() {
                    Ok(number) => CellContent::Number(number),
                    Err(_) => CellContent::Text(raw),
                },
                None => CellContent::Blank,
            },
        }
    };

    let format = cell.style.and_then(|style| styles.format_for(style));
    sheet
        .row_mut(row_index)
        .set_cell(column, Cell::new(content, format).with_date_system(date_1904));
    Ok(column + 1)
}
