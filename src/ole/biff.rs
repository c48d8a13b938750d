//! BIFF8 record primitives shared by the legacy reader and writer.
//!
//! Reference: [MS-XLS] §2.3 - Record Enumeration.

use crate::common::{Error, Result};

// stream structure
pub(crate) const BOF: u16 = 0x0809;
pub(crate) const EOF_RECORD: u16 = 0x000A;
pub(crate) const CONTINUE: u16 = 0x003C;

// workbook globals
pub(crate) const BOUNDSHEET: u16 = 0x0085;
pub(crate) const SST: u16 = 0x00FC;
pub(crate) const DATEMODE: u16 = 0x0022;
pub(crate) const CODEPAGE: u16 = 0x0042;
pub(crate) const WINDOW1: u16 = 0x003D;
pub(crate) const FORMAT: u16 = 0x041E;
pub(crate) const XF: u16 = 0x00E0;

// cell records
pub(crate) const DIMENSION: u16 = 0x0200;
pub(crate) const NUMBER: u16 = 0x0203;
pub(crate) const RK: u16 = 0x027E;
pub(crate) const MULRK: u16 = 0x00BD;
pub(crate) const BLANK: u16 = 0x0201;
pub(crate) const MULBLANK: u16 = 0x00BE;
pub(crate) const LABEL: u16 = 0x0204;
pub(crate) const LABELSST: u16 = 0x00FD;
pub(crate) const BOOLERR: u16 = 0x0205;
pub(crate) const FORMULA: u16 = 0x0006;

// sheet structure
pub(crate) const COLINFO: u16 = 0x007D;

// BOF document types
pub(crate) const BIFF8_VERSION: u16 = 0x0600;
pub(crate) const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub(crate) const BOF_WORKSHEET: u16 = 0x0010;

/// One record in a BIFF stream.
pub(crate) struct Record<'a> {
    pub id: u16,
    pub data: &'a [u8],
}

/// Walks the `(id, length, payload)` framing of a BIFF stream.
pub(crate) struct RecordIter<'a> {
    stream: &'a [u8],
    pos: usize,
}

impl<'a> RecordIter<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self::starting_at(stream, 0)
    }

    pub fn starting_at(stream: &'a [u8], offset: usize) -> Self {
        Self {
            stream,
            pos: offset,
        }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.stream.len() {
            return None;
        }
        if self.pos + 4 > self.stream.len() {
            self.pos = self.stream.len();
            return Some(Err(Error::Legacy("truncated record header".into())));
        }
        let id = u16::from_le_bytes([self.stream[self.pos], self.stream[self.pos + 1]]);
        let len = u16::from_le_bytes([self.stream[self.pos + 2], self.stream[self.pos + 3]]) as usize;
        let start = self.pos + 4;
        if start + len > self.stream.len() {
            self.pos = self.stream.len();
            return Some(Err(Error::Legacy("truncated record payload".into())));
        }
        self.pos = start + len;
        Some(Ok(Record {
            id,
            data: &self.stream[start..start + len],
        }))
    }
}

/// Little-endian cursor over one record's payload.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Legacy("record payload too short".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// Decode an RK-compressed number.
pub(crate) fn decode_rk(raw: u32) -> f64 {
    let divide_by_100 = raw & 0x1 != 0;
    let is_integer = raw & 0x2 != 0;
    let mut value = if is_integer {
        ((raw as i32) >> 2) as f64
    } else {
        f64::from_bits(((raw as u64) & 0xFFFF_FFFC) << 32)
    };
    if divide_by_100 {
        value /= 100.0;
    }
    value
}

// string option flags
const FLAG_HIGH_BYTE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

/// Read an XLUnicodeString. `wide_length` selects the 16-bit length form
/// (cell records) over the 8-bit one (BOUNDSHEET names).
pub(crate) fn read_unicode_string(r: &mut ByteReader<'_>, wide_length: bool) -> Result<String> {
    let char_count = if wide_length {
        r.u16()? as usize
    } else {
        r.u8()? as usize
    };
    read_unicode_string_body(r, char_count)
}

/// The flags-and-characters tail of an XLUnicodeString.
pub(crate) fn read_unicode_string_body(r: &mut ByteReader<'_>, char_count: usize) -> Result<String> {
    let flags = r.u8()?;
    let rich_runs = if flags & FLAG_RICH != 0 {
        r.u16()? as usize
    } else {
        0
    };
    let ext_len = if flags & FLAG_EXT != 0 {
        r.u32()? as usize
    } else {
        0
    };
    let text = decode_chars(r.take(char_width(flags) * char_count)?, flags);
    r.skip(rich_runs * 4 + ext_len)?;
    Ok(text)
}

pub(crate) fn char_width(flags: u8) -> usize {
    if flags & FLAG_HIGH_BYTE != 0 { 2 } else { 1 }
}

pub(crate) fn decode_chars(raw: &[u8], flags: u8) -> String {
    if flags & FLAG_HIGH_BYTE != 0 {
        encoding_rs::UTF_16LE
            .decode_without_bom_handling(raw)
            .0
            .into_owned()
    } else {
        // compressed form: each byte is the low byte of a UTF-16 unit
        raw.iter().map(|&b| b as char).collect()
    }
}

/// Append an XLUnicodeString, choosing the compressed form when every
/// UTF-16 unit fits one byte.
pub(crate) fn write_unicode_string(out: &mut Vec<u8>, text: &str, wide_length: bool) {
    let units: Vec<u16> = text.encode_utf16().collect();
    let char_count = units.len().min(u16::MAX as usize);
    let units = &units[..char_count];
    if wide_length {
        out.extend_from_slice(&(char_count as u16).to_le_bytes());
    } else {
        out.push(char_count.min(u8::MAX as usize) as u8);
    }
    if units.iter().all(|&u| u < 0x100) {
        out.push(0);
        out.extend(units.iter().map(|&u| u as u8));
    } else {
        out.push(FLAG_HIGH_BYTE);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
}

/// Parse a shared string table spread across the SST record and its
/// CONTINUE records. Strings may be split at character boundaries; each
/// continuation re-states the option flags for the remaining characters.
pub(crate) fn parse_sst(fragments: &[&[u8]]) -> Result<Vec<String>> {
    let first = fragments
        .first()
        .ok_or_else(|| Error::Legacy("empty shared string table".into()))?;
    let mut cursor = SstCursor {
        fragments,
        fragment: 0,
        reader: ByteReader::new(first),
    };
    cursor.reader.skip(4)?; // total reference count
    let unique = cursor.read_u32()? as usize;

    let mut strings = Vec::with_capacity(unique.min(1 << 20));
    for _ in 0..unique {
        let char_count = cursor.read_u16()? as usize;
        let mut flags = cursor.read_u8()?;
        let rich_runs = if flags & FLAG_RICH != 0 {
            cursor.read_u16()? as usize
        } else {
            0
        };
        let ext_len = if flags & FLAG_EXT != 0 {
            cursor.read_u32()? as usize
        } else {
            0
        };

        let mut text = String::new();
        let mut pending = char_count;
        while pending > 0 {
            if cursor.reader.remaining() == 0 {
                cursor.advance()?;
                // a continuation restates the flags byte for its characters
                flags = cursor.read_u8()?;
            }
            let here = (cursor.reader.remaining() / char_width(flags)).min(pending);
            if here == 0 {
                return Err(Error::Legacy("malformed shared string continuation".into()));
            }
            let raw = cursor.reader.take(here * char_width(flags))?;
            text.push_str(&decode_chars(raw, flags));
            pending -= here;
        }
        cursor.skip(rich_runs * 4 + ext_len)?;
        strings.push(text);
    }
    Ok(strings)
}

struct SstCursor<'a> {
    fragments: &'a [&'a [u8]],
    fragment: usize,
    reader: ByteReader<'a>,
}

impl<'a> SstCursor<'a> {
    fn advance(&mut self) -> Result<()> {
        self.fragment += 1;
        let next = self
            .fragments
            .get(self.fragment)
            .ok_or_else(|| Error::Legacy("shared string table ends mid-string".into()))?;
        self.reader = ByteReader::new(next);
        Ok(())
    }

    fn ensure(&mut self, n: usize) -> Result<()> {
        // header fields never straddle a continuation boundary
        if self.reader.remaining() == 0 {
            self.advance()?;
        }
        if self.reader.remaining() < n {
            return Err(Error::Legacy("truncated shared string table".into()));
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.reader.u8()
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.reader.u16()
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.reader.u32()
    }

    fn skip(&mut self, mut n: usize) -> Result<()> {
        while n > 0 {
            if self.reader.remaining() == 0 {
                self.advance()?;
            }
            let here = self.reader.remaining().min(n);
            self.reader.skip(here)?;
            n -= here;
        }
        Ok(())
    }
}

/// Append one framed record.
pub(crate) fn push_record(stream: &mut Vec<u8>, id: u16, payload: &[u8]) {
    stream.extend_from_slice(&id.to_le_bytes());
    stream.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    stream.extend_from_slice(payload);
}

/// Map a BIFF error code to its display marker.
pub(crate) fn error_code_name(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        _ => "#UNKNOWN!",
    }
}
