//! Fully-buffered writer for the legacy binary workbook.
//!
//! Every sheet is materialized before encoding, because the BIFF stream
//! embeds absolute substream offsets in its sheet catalog; the container
//! format cannot flush rows incrementally. Exports of very large datasets
//! belong in the streaming OOXML writer instead.

use std::io::{Cursor, Write};

use log::warn;

use crate::common::{Error, Result};
use crate::factory::WriteCell;

use super::biff::{self, push_record, write_unicode_string};

/// Longest text an inline label cell stores.
pub(crate) const MAX_TEXT_LEN: usize = 255;

/// Cell formats reference XF 15, the first cell XF after the 15 built-in
/// style XFs.
const CELL_XF: u16 = 15;

/// The fully-buffered legacy workbook writer.
pub struct XlsBookWriter {
    sheets: Vec<BufferedSheet>,
}

struct BufferedSheet {
    name: String,
    rows: Vec<Vec<WriteCell>>,
    widths: Vec<u16>,
}

impl XlsBookWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Add a sheet and get its handle. Sheet names cap at 31 characters,
    /// the format's limit.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(Error::SheetExists(name.to_string()));
        }
        self.sheets.push(BufferedSheet {
            name: name.chars().take(31).collect(),
            rows: Vec::new(),
            widths: Vec::new(),
        });
        Ok(self.sheets.len() - 1)
    }

    /// Append one row of cells to a sheet.
    pub fn append_row(&mut self, sheet: usize, cells: &[WriteCell]) -> Result<()> {
        self.sheet_mut(sheet)?.rows.push(cells.to_vec());
        Ok(())
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

    /// Encode the workbook stream and wrap it in the compound container.
    pub fn finish<W: Write>(self, mut out: W) -> Result<()> {
        let stream = self.build_stream();

        let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new()))
            .map_err(|e| Error::Legacy(format!("container create failed: {e}")))?;
        {
            let mut workbook = compound
                .create_stream("/Workbook")
                .map_err(|e| Error::Legacy(format!("stream create failed: {e}")))?;
            workbook.write_all(&stream)?;
        }
        compound.flush()?;
        out.write_all(&compound.into_inner().into_inner())?;
        Ok(())
    }

    fn sheet_mut(&mut self, sheet: usize) -> Result<&mut BufferedSheet> {
        self.sheets.get_mut(sheet).ok_or(Error::SheetIndex(sheet))
    }

    /// Workbook globals, then one substream per sheet, with the sheet
    /// catalog patched to the substream offsets.
    fn build_stream(&self) -> Vec<u8> {
        let mut stream = Vec::new();

        push_record(&mut stream, biff::BOF, &bof_payload(biff::BOF_WORKBOOK_GLOBALS));
        push_record(&mut stream, biff::CODEPAGE, &1200u16.to_le_bytes());
        push_record(&mut stream, biff::WINDOW1, &window1_payload());
        push_record(&mut stream, biff::DATEMODE, &0u16.to_le_bytes());

        // 15 style XFs then the one cell XF the cells reference
        for _ in 0..15 {
            push_record(&mut stream, biff::XF, &xf_payload(true));
        }
        push_record(&mut stream, biff::XF, &xf_payload(false));

        let mut offset_slots = Vec::with_capacity(self.sheets.len());
        for sheet in &self.sheets {
            let mut payload = vec![0u8; 4]; // substream offset, patched below
            payload.extend_from_slice(&0u16.to_le_bytes()); // visible worksheet
            write_unicode_string(&mut payload, &sheet.name, false);
            offset_slots.push(stream.len() + 4);
            push_record(&mut stream, biff::BOUNDSHEET, &payload);
        }
        push_record(&mut stream, biff::EOF_RECORD, &[]);

        for (sheet, slot) in self.sheets.iter().zip(offset_slots) {
            let offset = (stream.len() as u32).to_le_bytes();
            stream[slot..slot + 4].copy_from_slice(&offset);
            encode_sheet(&mut stream, sheet);
        }
        stream
    }
}

impl Default for XlsBookWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_sheet(stream: &mut Vec<u8>, sheet: &BufferedSheet) {
    push_record(stream, biff::BOF, &bof_payload(biff::BOF_WORKSHEET));

    let row_count = sheet.rows.len() as u32;
    let col_count = sheet.rows.iter().map(Vec::len).max().unwrap_or(0) as u16;
    let mut dimension = Vec::with_capacity(14);
    dimension.extend_from_slice(&0u32.to_le_bytes());
    dimension.extend_from_slice(&row_count.to_le_bytes());
    dimension.extend_from_slice(&0u16.to_le_bytes());
    dimension.extend_from_slice(&col_count.to_le_bytes());
    dimension.extend_from_slice(&0u16.to_le_bytes());
    push_record(stream, biff::DIMENSION, &dimension);

    for (index, width) in sheet.widths.iter().enumerate() {
        let column = index as u16;
        let mut colinfo = Vec::with_capacity(12);
        colinfo.extend_from_slice(&column.to_le_bytes());
        colinfo.extend_from_slice(&column.to_le_bytes());
        let units = ((*width as u32 + 2).min(255) * 256) as u16;
        colinfo.extend_from_slice(&units.to_le_bytes());
        colinfo.extend_from_slice(&CELL_XF.to_le_bytes());
        colinfo.extend_from_slice(&0u16.to_le_bytes());
        colinfo.extend_from_slice(&0u16.to_le_bytes());
        push_record(stream, biff::COLINFO, &colinfo);
    }

    for (row_index, row) in sheet.rows.iter().enumerate() {
        if row_index > u16::MAX as usize {
            warn!("row {row_index} exceeds the legacy row limit; dropping the rest");
            break;
        }
        for (col_index, cell) in row.iter().enumerate() {
            if col_index > 0xFF {
                warn!("column {col_index} exceeds the legacy column limit; dropping the rest of the row");
                break;
            }
            encode_cell(stream, row_index as u16, col_index as u16, cell);
        }
    }
    push_record(stream, biff::EOF_RECORD, &[]);
}

fn encode_cell(stream: &mut Vec<u8>, row: u16, col: u16, cell: &WriteCell) {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&row.to_le_bytes());
    payload.extend_from_slice(&col.to_le_bytes());
    payload.extend_from_slice(&CELL_XF.to_le_bytes());
    match cell {
        WriteCell::Blank => push_record(stream, biff::BLANK, &payload),
        WriteCell::Number(n) => {
            payload.extend_from_slice(&n.to_le_bytes());
            push_record(stream, biff::NUMBER, &payload);
        }
        WriteCell::Bool(b) => {
            payload.push(u8::from(*b));
            payload.push(0); // value, not an error
            push_record(stream, biff::BOOLERR, &payload);
        }
        WriteCell::Text(s) => {
            // the serializer clips to MAX_TEXT_LEN; clamp again in case
            let clipped: String = s.chars().take(MAX_TEXT_LEN).collect();
            write_unicode_string(&mut payload, &clipped, true);
            push_record(stream, biff::LABEL, &payload);
        }
    }
}

fn bof_payload(document_type: u16) -> [u8; 16] {
    let mut payload = [0u8; 16];
    payload[0..2].copy_from_slice(&biff::BIFF8_VERSION.to_le_bytes());
    payload[2..4].copy_from_slice(&document_type.to_le_bytes());
    payload[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes()); // build id
    payload[6..8].copy_from_slice(&0x07CCu16.to_le_bytes()); // build year
    payload
}

fn window1_payload() -> [u8; 18] {
    let mut payload = [0u8; 18];
    payload[0..2].copy_from_slice(&0x0168u16.to_le_bytes()); // window x
    payload[2..4].copy_from_slice(&0x010Eu16.to_le_bytes()); // window y
    payload[4..6].copy_from_slice(&0x3A5Cu16.to_le_bytes()); // width
    payload[6..8].copy_from_slice(&0x23BEu16.to_le_bytes()); // height
    payload[8..10].copy_from_slice(&0x0038u16.to_le_bytes()); // flags: visible
    payload[14..16].copy_from_slice(&1u16.to_le_bytes()); // selected tab count
    payload[16..18].copy_from_slice(&0x0258u16.to_le_bytes()); // tab ratio
    payload
}

fn xf_payload(style: bool) -> [u8; 20] {
    let mut payload = [0u8; 20];
    // font 0, format 0
    let flags: u16 = if style { 0xFFF5 } else { 0x0001 };
    payload[4..6].copy_from_slice(&flags.to_le_bytes());
    payload
}
