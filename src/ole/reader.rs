//! Decoder for the legacy binary workbook.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::common::{Error, Result};
use crate::sheet::{Cell, CellContent, NumberFormat, Sheet, Workbook, builtin_format_code};

use super::biff::{self, ByteReader, RecordIter, read_unicode_string};

/// Decode a legacy workbook from raw bytes.
pub fn decode(bytes: &[u8]) -> Result<Workbook> {
    let mut compound = cfb::CompoundFile::open(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::Legacy(format!("not a compound file: {e}")))?;
    let mut stream = compound
        .open_stream("/Workbook")
        .or_else(|_| compound.open_stream("/Book"))
        .map_err(|_| Error::Legacy("workbook stream missing".into()))?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    decode_stream(&data)
}

struct BoundSheet {
    name: String,
    offset: usize,
    is_worksheet: bool,
}

#[derive(Default)]
struct Globals {
    date_1904: bool,
    bound_sheets: Vec<BoundSheet>,
    shared_strings: Vec<String>,
    /// FORMAT records: format id -> code
    formats: HashMap<u32, String>,
    /// XF records in file order: cell format index -> format id
    xf_format_ids: Vec<u32>,
}

impl Globals {
    fn format_for(&self, xf_index: u16) -> Option<NumberFormat> {
        let id = *self.xf_format_ids.get(xf_index as usize)?;
        let code = self
            .formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_format_code(id).map(str::to_string))
            .unwrap_or_else(|| "General".to_string());
        Some(NumberFormat::new(id, code))
    }
}

/// Decode the BIFF stream: one pass over the workbook globals substream,
/// then one pass per worksheet substream.
fn decode_stream(data: &[u8]) -> Result<Workbook> {
    let globals = parse_globals(data)?;

    let mut workbook = Workbook::new();
    for bound in globals.bound_sheets.iter().filter(|b| b.is_worksheet) {
        workbook.push_sheet(parse_worksheet(data, bound, &globals)?);
    }
    Ok(workbook)
}

fn parse_globals(data: &[u8]) -> Result<Globals> {
    let mut globals = Globals::default();
    let mut records = RecordIter::new(data);
    let mut sst_fragments: Vec<&[u8]> = Vec::new();
    let mut in_sst = false;

    while let Some(record) = records.next() {
        let record = record?;
        if record.id != biff::CONTINUE {
            if in_sst {
                globals.shared_strings = biff::parse_sst(&sst_fragments)?;
                sst_fragments.clear();
                in_sst = false;
            }
        } else if in_sst {
            sst_fragments.push(record.data);
            continue;
        }

        match record.id {
            biff::EOF_RECORD => break,
            biff::DATEMODE => {
                let mut r = ByteReader::new(record.data);
                globals.date_1904 = r.u16()? == 1;
            }
            biff::FORMAT => {
                let mut r = ByteReader::new(record.data);
                let id = r.u16()? as u32;
                let code = read_unicode_string(&mut r, true)?;
                globals.formats.insert(id, code);
            }
            biff::XF => {
                let mut r = ByteReader::new(record.data);
                r.skip(2)?; // font index
                globals.xf_format_ids.push(r.u16()? as u32);
            }
            biff::BOUNDSHEET => {
                let mut r = ByteReader::new(record.data);
                let offset = r.u32()? as usize;
                let options = r.u16()?;
                let name = read_unicode_string(&mut r, false)?;
                globals.bound_sheets.push(BoundSheet {
                    name,
                    offset,
                    is_worksheet: (options >> 8) & 0xFF == 0,
                });
            }
            biff::SST => {
                sst_fragments.push(record.data);
                in_sst = true;
            }
            _ => {}
        }
    }
    if in_sst {
        globals.shared_strings = biff::parse_sst(&sst_fragments)?;
    }
    Ok(globals)
}

fn parse_worksheet(data: &[u8], bound: &BoundSheet, globals: &Globals) -> Result<Sheet> {
    if bound.offset >= data.len() {
        return Err(Error::Legacy(format!(
            "sheet `{}` starts past the end of the stream",
            bound.name
        )));
    }
    let mut sheet = Sheet::new(&bound.name);
    let mut records = RecordIter::starting_at(data, bound.offset);

    // the substream must open with its own BOF
    match records.next() {
        Some(Ok(record)) if record.id == biff::BOF => {}
        _ => {
            return Err(Error::Legacy(format!(
                "sheet `{}` does not start with a BOF record",
                bound.name
            )));
        }
    }

    let place = |sheet: &mut Sheet, row: u16, col: u16, content: CellContent, xf: u16| {
        let cell = Cell::new(content, globals.format_for(xf)).with_date_system(globals.date_1904);
        sheet.row_mut(row as u32).set_cell(col as u32, cell);
    };

    for record in records {
        let record = record?;
        let mut r = ByteReader::new(record.data);
        match record.id {
            biff::EOF_RECORD => break,
            biff::NUMBER => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let value = r.f64()?;
                place(&mut sheet, row, col, CellContent::Number(value), xf);
            }
            biff::RK => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let value = biff::decode_rk(r.u32()?);
                place(&mut sheet, row, col, CellContent::Number(value), xf);
            }
            biff::MULRK => {
                let row = r.u16()?;
                let first_col = r.u16()?;
                // one (xf, rk) pair per cell; the trailing u16 is the last column
                let pairs = (record.data.len().saturating_sub(6)) / 6;
                for i in 0..pairs {
                    let xf = r.u16()?;
                    let value = biff::decode_rk(r.u32()?);
                    place(
                        &mut sheet,
                        row,
                        first_col.saturating_add(i as u16),
                        CellContent::Number(value),
                        xf,
                    );
                }
            }
            biff::BLANK => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                place(&mut sheet, row, col, CellContent::Blank, xf);
            }
            biff::MULBLANK => {
                let row = r.u16()?;
                let first_col = r.u16()?;
                let count = (record.data.len().saturating_sub(6)) / 2;
                for i in 0..count {
                    let xf = r.u16()?;
                    place(
                        &mut sheet,
                        row,
                        first_col.saturating_add(i as u16),
                        CellContent::Blank,
                        xf,
                    );
                }
            }
            biff::LABEL => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let text = read_unicode_string(&mut r, true)?;
                place(&mut sheet, row, col, CellContent::Text(text), xf);
            }
            biff::LABELSST => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let index = r.u32()? as usize;
                let text = globals.shared_strings.get(index).ok_or_else(|| {
                    Error::Legacy(format!("shared string index {index} out of range"))
                })?;
                place(&mut sheet, row, col, CellContent::Text(text.clone()), xf);
            }
            biff::BOOLERR => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let value = r.u8()?;
                let is_error = r.u8()? != 0;
                let content = if is_error {
                    CellContent::Error(biff::error_code_name(value).to_string())
                } else {
                    CellContent::Bool(value != 0)
                };
                place(&mut sheet, row, col, content, xf);
            }
            biff::FORMULA => {
                let (row, col, xf) = (r.u16()?, r.u16()?, r.u16()?);
                let cached = r.take(8)?;
                // a 0xFFFF tag in the top bytes marks a non-numeric cached
                // result (string, boolean, error, or blank)
                let value = if cached[6] == 0xFF && cached[7] == 0xFF {
                    None
                } else {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(cached);
                    Some(f64::from_le_bytes(bytes))
                };
                place(&mut sheet, row, col, CellContent::Formula(value), xf);
            }
            _ => {}
        }
    }
    Ok(sheet)
}
