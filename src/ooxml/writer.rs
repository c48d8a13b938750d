//! Streaming writer for the OOXML spreadsheet package.
//!
//! Every sheet owns a spill file. Appended rows enter a resident window of
//! at most [`ROW_WINDOW`] rows; once the window is full the oldest row is
//! encoded to the spill file and is no longer addressable. This bounds
//! memory for exports with hundreds of thousands of rows; the final package
//! is assembled by streaming each spill file into the ZIP archive.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::common::{Error, Result};
use crate::factory::WriteCell;
use crate::sheet::column_letters;

/// Rows of a sheet kept resident before older rows are flushed to the
/// spill file.
pub const ROW_WINDOW: usize = 5_000;

/// Longest text the worksheet format stores in one cell.
pub(crate) const MAX_TEXT_LEN: usize = 32_767;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const RELS_DOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border/></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"</styleSheet>"#,
);

/// The row-windowed streaming workbook writer.
pub struct XlsxBookWriter {
    sheets: Vec<SheetStream>,
    row_window: usize,
}

struct SheetStream {
    name: String,
    spill: BufWriter<File>,
    window: VecDeque<Vec<WriteCell>>,
    /// Index of the first row still resident.
    window_start: u32,
    total_rows: u32,
    widths: Vec<u16>,
}

impl XlsxBookWriter {
    /// Writer with the default row window.
    pub fn new() -> Self {
        Self::with_row_window(ROW_WINDOW)
    }

    /// Writer with an explicit row window (at least one row).
    pub fn with_row_window(rows: usize) -> Self {
        Self {
            sheets: Vec::new(),
            row_window: rows.max(1),
        }
    }

    /// Add a sheet and get its handle.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(Error::SheetExists(name.to_string()));
        }
        self.sheets.push(SheetStream {
            name: name.to_string(),
            spill: BufWriter::new(tempfile::tempfile()?),
            window: VecDeque::new(),
            window_start: 0,
            total_rows: 0,
            widths: Vec::new(),
        });
        Ok(self.sheets.len() - 1)
    }

    /// Append one row; may flush the oldest resident row to the spill file.
    pub fn append_row(&mut self, sheet: usize, cells: &[WriteCell]) -> Result<()> {
        let window = self.row_window;
        let stream = self.sheet_mut(sheet)?;
        stream.window.push_back(cells.to_vec());
        stream.total_rows += 1;
        while stream.window.len() > window {
            let row = stream.window.pop_front().unwrap_or_default();
            encode_row(&mut stream.spill, stream.window_start + 1, &row)?;
            stream.window_start += 1;
        }
        Ok(())
    }

    /// Rows currently resident in a sheet's window.
    pub fn resident_row_count(&self, sheet: usize) -> usize {
        self.sheets.get(sheet).map(|s| s.window.len()).unwrap_or(0)
    }

    /// Rows appended to a sheet so far.
    pub fn total_row_count(&self, sheet: usize) -> u32 {
        self.sheets.get(sheet).map(|s| s.total_rows).unwrap_or(0)
    }

    /// A resident row by its global index. Flushed rows are gone: once a
    /// row leaves the window it is no longer readable from the live
    /// workbook.
    pub fn row(&self, sheet: usize, index: u32) -> Option<&[WriteCell]> {
        let stream = self.sheets.get(sheet)?;
        if index < stream.window_start {
            return None;
        }
        stream
            .window
            .get((index - stream.window_start) as usize)
            .map(Vec::as_slice)
    }

    /// Set the sized column band, one width (characters) per column.
    pub fn set_column_widths(&mut self, sheet: usize, widths: &[u16]) -> Result<()> {
        self.sheet_mut(sheet)?.widths = widths.to_vec();
        Ok(())
    }

    /// Longest text one cell stores.
    pub fn max_text_len(&self) -> usize {
        MAX_TEXT_LEN
    }

    /// Assemble the package into `out`.
    pub fn finish<W: Write + Seek>(self, out: W) -> Result<()> {
        let mut zip = ZipWriter::new(out);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        write_entry(&mut zip, "[Content_Types].xml", &content_types_xml(self.sheets.len()), options)?;
        write_entry(&mut zip, "_rels/.rels", RELS_DOT_RELS, options)?;
        let names: Vec<&str> = self.sheets.iter().map(|s| s.name.as_str()).collect();
        write_entry(&mut zip, "xl/workbook.xml", &workbook_xml(&names), options)?;
        write_entry(
            &mut zip,
            "xl/_rels/workbook.xml.rels",
            &workbook_rels_xml(self.sheets.len()),
            options,
        )?;
        write_entry(&mut zip, "xl/styles.xml", STYLES_XML, options)?;

        for (index, mut stream) in self.sheets.into_iter().enumerate() {
            // drain whatever is still resident
            while let Some(row) = stream.window.pop_front() {
                encode_row(&mut stream.spill, stream.window_start + 1, &row)?;
                stream.window_start += 1;
            }
            stream.spill.flush()?;
            let mut spill = stream
                .spill
                .into_inner()
                .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
            spill.seek(SeekFrom::Start(0))?;

            zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
            zip.write_all(worksheet_prefix(&stream.widths).as_bytes())?;
            io::copy(&mut spill, &mut zip)?;
            zip.write_all(b"</sheetData><pageMargins left=\"0.75\" right=\"0.75\" top=\"1\" bottom=\"1\" header=\"0.5\" footer=\"0.5\"/></worksheet>")?;
        }

        zip.finish()?;
        Ok(())
    }

    fn sheet_mut(&mut self, sheet: usize) -> Result<&mut SheetStream> {
        self.sheets.get_mut(sheet).ok_or(Error::SheetIndex(sheet))
    }
}

impl Default for XlsxBookWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &str,
    content: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(path, options)?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

/// One `<row>` element with explicit cell references.
fn encode_row<W: Write>(out: &mut W, row_number: u32, cells: &[WriteCell]) -> Result<()> {
    write!(out, "<row r=\"{row_number}\">")?;
    let mut float_buf = ryu::Buffer::new();
    for (column, cell) in cells.iter().enumerate() {
        let cell_ref = format!("{}{row_number}", column_letters(column as u32));
        match cell {
            WriteCell::Blank => write!(out, "<c r=\"{cell_ref}\"/>")?,
            WriteCell::Number(n) => {
                write!(out, "<c r=\"{cell_ref}\"><v>{}</v></c>", float_buf.format(*n))?
            }
            WriteCell::Bool(b) => write!(
                out,
                "<c r=\"{cell_ref}\" t=\"b\"><v>{}</v></c>",
                if *b { 1 } else { 0 }
            )?,
            WriteCell::Text(s) => {
                let space = if s.starts_with(char::is_whitespace)
                    || s.ends_with(char::is_whitespace)
                {
                    " xml:space=\"preserve\""
                } else {
                    ""
                };
                write!(
                    out,
                    "<c r=\"{cell_ref}\" t=\"inlineStr\"><is><t{space}>{}</t></is></c>",
                    escape(s.as_str())
                )?
            }
        }
    }
    write!(out, "</row>")?;
    Ok(())
}

fn worksheet_prefix(widths: &[u16]) -> String {
    let mut prefix = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#,
        r#"<sheetFormatPr defaultRowHeight="15"/>"#,
    ));
    if !widths.is_empty() {
        prefix.push_str("<cols>");
        for (index, width) in widths.iter().enumerate() {
            let column = index + 1;
            // a little breathing room past the widest entry
            let width = width + 2;
            prefix.push_str(&format!(
                r#"<col min="{column}" max="{column}" width="{width}" customWidth="1"/>"#
            ));
        }
        prefix.push_str("</cols>");
    }
    prefix.push_str("<sheetData>");
    prefix
}

fn workbook_xml(sheet_names: &[&str]) -> String {
    let mut sheets = String::new();
    for (index, name) in sheet_names.iter().enumerate() {
        sheets.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(*name),
            index + 1,
            index + 1,
        ));
    }
    format!(
        concat!(
            r#"{}"#,
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<bookViews><workbookView activeTab="0"/></bookViews>"#,
            r#"<sheets>{}</sheets>"#,
            r#"</workbook>"#,
        ),
        XML_DECLARATION, sheets
    )
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut relationships = String::new();
    for index in 1..=sheet_count {
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{index}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{index}.xml"/>"#
        ));
    }
    let styles_id = sheet_count + 1;
    relationships.push_str(&format!(
        r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));
    format!(
        concat!(
            r#"{}"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        ),
        XML_DECLARATION, relationships
    )
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut overrides = String::new();
    for index in 1..=sheet_count {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    format!(
        concat!(
            r#"{}"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
            r#"{}"#,
            r#"</Types>"#,
        ),
        XML_DECLARATION, overrides
    )
}
