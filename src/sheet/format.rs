//! Number-format classification and date serial conversion.
//!
//! Whether a numeric cell renders as a calendar date is decided purely from
//! its display format - a function of the format id and code alone, with no
//! cached or global state.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// A numeric display format attached to a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFormat {
    /// Format id; built-in formats occupy ids below 164.
    pub id: u32,
    /// Format code (e.g. `"General"`, `"0.00"`, `"mm/dd/yyyy"`)
    pub code: String,
}

impl NumberFormat {
    /// Create a new number format.
    #[inline]
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }

    /// The generic default format.
    pub fn general() -> Self {
        Self::new(0, "General")
    }

    /// Check if this is a built-in format (id < 164).
    #[inline]
    pub fn is_builtin(&self) -> bool {
        self.id < 164
    }

    /// Whether this format renders its number as a date or time of day.
    pub fn is_date(&self) -> bool {
        if self.is_builtin() {
            return matches!(self.id, 14..=22 | 45..=47);
        }
        is_date_format(&self.code)
    }

    /// Whether this format is the generic default or the literal text
    /// marker, i.e. carries no numeric presentation of its own.
    pub fn is_general_or_text(&self) -> bool {
        self.code.is_empty() || self.code == "General" || self.code == "@"
    }
}

/// Check if a custom format code represents a date/time format.
///
/// Quoted and escaped literals and bracket sections are ignored; only the
/// first section (up to `;`) is classified. Elapsed-duration codes such as
/// `[h]:mm:ss` are not dates.
pub fn is_date_format(code: &str) -> bool {
    let mut escaped = false;
    let mut in_quotes = false;
    let mut bracket_depth = 0u8;
    let mut elapsed = false;
    let mut am_pm = false;
    let mut prev = ' ';

    for ch in code.chars() {
        if escaped {
            escaped = false;
            prev = ch;
            continue;
        }
        if in_quotes {
            if ch == '"' {
                in_quotes = false;
            }
            prev = ch;
            continue;
        }
        match ch {
            '_' | '\\' => escaped = true,
            '"' => in_quotes = true,
            ';' => return false,
            '[' => bracket_depth += 1,
            ']' => {
                if bracket_depth == 1 && elapsed {
                    // [h], [mm] and friends count elapsed time, not a date
                    return false;
                }
                bracket_depth = bracket_depth.saturating_sub(1);
            }
            'p' | 'P' | 'm' | 'M' | '/' if am_pm && bracket_depth == 0 => return true,
            'a' | 'A' if !am_pm && bracket_depth == 0 => am_pm = true,
            'd' | 'D' | 'm' | 'M' | 'h' | 'H' | 'y' | 'Y' | 's' | 'S'
                if !am_pm && bracket_depth == 0 =>
            {
                return true;
            }
            _ => {}
        }
        if !(elapsed && ch.eq_ignore_ascii_case(&prev)) {
            elapsed = prev == '[' && matches!(ch, 'm' | 'h' | 's' | 'M' | 'H' | 'S');
        }
        prev = ch;
    }
    false
}

/// Get the format code for a built-in number format id.
///
/// Returns `None` if the id is not a recognized built-in format.
pub(crate) fn builtin_format_code(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

/// Days separating the 1904 date system from the 1900 one.
pub(crate) const DATE_SYSTEM_1904_OFFSET: i64 = 1_462;

/// Convert a date serial in the 1900 date system to a timestamp.
///
/// Serial 1 is 1900-01-01; the fractional part is the time of day. Serial
/// 60 is the phantom 1900-02-29 the format inherited from Lotus 1-2-3, so
/// serials from 61 on are shifted back one day. Callers holding a
/// 1904-system serial add [`DATE_SYSTEM_1904_OFFSET`] first.
///
/// Returns `None` for negative or non-finite serials.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.floor() as i64;
    let adjusted = if days >= 61 { days - 1 } else { days };
    let mut date =
        NaiveDate::from_ymd_opt(1899, 12, 31)?.checked_add_signed(Duration::days(adjusted))?;
    let mut seconds = ((serial - days as f64) * 86_400.0).round() as i64;
    if seconds >= 86_400 {
        date = date.checked_add_signed(Duration::days(1))?;
        seconds = 0;
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)?;
    Some(NaiveDateTime::new(date, time))
}
