//! Range-bounded extraction of canonical values.
//!
//! Blank rows are skipped; blank columns never are. Eliding an empty column
//! would shift every later column left and break positional alignment, so
//! absent cells surface as `Null` at their index instead.

use std::ops::Range;

use crate::common::{Error, Result};

use super::model::{Row, Sheet, SheetSelector, Workbook};
use super::value::CellValue;

impl Row {
    /// Values for columns `0..=last`, with `Null` at absent columns.
    pub fn values(&self) -> Vec<CellValue> {
        match self.last_column() {
            Some(last) => self.window_values(0..last + 1),
            None => Vec::new(),
        }
    }

    /// One value per column index in `columns`, `Null` where no cell is
    /// present, regardless of cell presence at either end.
    pub fn window_values(&self, columns: Range<u32>) -> Vec<CellValue> {
        columns
            .map(|col| self.cell(col).map(|c| c.value()).unwrap_or(CellValue::Null))
            .collect()
    }

    /// A row is blank iff every present cell coerces to `Null`. A row with
    /// even one non-null value (a zero counts) is not blank.
    pub fn is_blank(&self) -> bool {
        self.cells().all(|(_, cell)| cell.value().is_null())
    }
}

impl Sheet {
    /// All rows as canonical values, blank rows elided.
    pub fn values(&self) -> Vec<Vec<CellValue>> {
        self.rows()
            .filter(|(_, row)| !row.is_blank())
            .map(|(_, row)| row.values())
            .collect()
    }

    /// Rows and columns restricted to half-open windows.
    ///
    /// A degenerate window (start past end on either axis) is a no-op and
    /// yields an empty result. A window end beyond the sheet's physical
    /// extents is an error.
    pub fn range_values(
        &self,
        rows: Range<u32>,
        columns: Range<u32>,
    ) -> Result<Vec<Vec<CellValue>>> {
        if rows.start > rows.end || columns.start > columns.end {
            return Ok(Vec::new());
        }
        let row_count = self.physical_row_count();
        if rows.end > row_count {
            return Err(Error::RowRangeOutOfBounds {
                end: rows.end,
                count: row_count,
            });
        }
        let column_count = self.physical_column_count();
        if columns.end > column_count {
            return Err(Error::ColumnRangeOutOfBounds {
                end: columns.end,
                count: column_count,
            });
        }

        let mut out = Vec::new();
        for index in rows {
            // an absent row index reads as blank
            let Some(row) = self.row(index) else { continue };
            if row.is_blank() {
                continue;
            }
            out.push(row.window_values(columns.clone()));
        }
        Ok(out)
    }
}

impl Workbook {
    /// Read a whole sheet, blank rows elided.
    ///
    /// An absent sheet *name* reads as empty - nothing to read. An
    /// out-of-range *index* is a caller error.
    pub fn sheet_values<'a>(
        &self,
        selector: impl Into<SheetSelector<'a>>,
    ) -> Result<Vec<Vec<CellValue>>> {
        Ok(match self.resolve(selector.into())? {
            Some(sheet) => sheet.values(),
            None => Vec::new(),
        })
    }

    /// Read a row/column window of a sheet, half-open on both axes.
    pub fn sheet_range<'a>(
        &self,
        selector: impl Into<SheetSelector<'a>>,
        rows: Range<u32>,
        columns: Range<u32>,
    ) -> Result<Vec<Vec<CellValue>>> {
        match self.resolve(selector.into())? {
            Some(sheet) => sheet.range_values(rows, columns),
            None => Ok(Vec::new()),
        }
    }

    /// Read from `(start_row, start_column)` to the sheet's physical
    /// extents.
    pub fn sheet_values_from<'a>(
        &self,
        selector: impl Into<SheetSelector<'a>>,
        start_row: u32,
        start_column: u32,
    ) -> Result<Vec<Vec<CellValue>>> {
        match self.resolve(selector.into())? {
            Some(sheet) => sheet.range_values(
                start_row..sheet.physical_row_count(),
                start_column..sheet.physical_column_count(),
            ),
            None => Ok(Vec::new()),
        }
    }

    fn resolve<'s>(&'s self, selector: SheetSelector<'_>) -> Result<Option<&'s Sheet>> {
        match selector {
            SheetSelector::Index(index) => self
                .sheets()
                .get(index)
                .map(Some)
                .ok_or(Error::SheetIndex(index)),
            SheetSelector::Name(name) => Ok(self.sheet(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::cell::Cell;

    fn sheet_with(rows: &[&[Option<Cell>]]) -> Sheet {
        let mut sheet = Sheet::new("data");
        for (r, cells) in rows.iter().enumerate() {
            for (c, cell) in cells.iter().enumerate() {
                if let Some(cell) = cell {
                    sheet.row_mut(r as u32).set_cell(c as u32, cell.clone());
                }
            }
        }
        sheet
    }

    #[test]
    fn blank_rows_are_elided_but_zero_rows_are_not() {
        let sheet = sheet_with(&[
            &[Some(Cell::blank()), Some(Cell::blank()), Some(Cell::blank())],
            &[
                Some(Cell::blank()),
                Some(Cell::text("")),
                Some(Cell::number_with_format(
                    0.0,
                    crate::sheet::NumberFormat::new(2, "0.00"),
                )),
            ],
        ]);
        let rows = sheet.values();
        // the all-blank row disappears; the row holding Number(0) stays
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![CellValue::Null, CellValue::Null, CellValue::Number(0.0)]
        );
    }

    #[test]
    fn interior_gaps_keep_their_columns() {
        let mut sheet = Sheet::new("gaps");
        sheet.row_mut(0).set_cell(0, Cell::text("a"));
        sheet.row_mut(0).set_cell(3, Cell::text("d"));
        assert_eq!(
            sheet.values(),
            vec![vec![
                CellValue::Text("a".into()),
                CellValue::Null,
                CellValue::Null,
                CellValue::Text("d".into()),
            ]]
        );
    }

    #[test]
    fn zero_width_windows_are_a_no_op() {
        let sheet = sheet_with(&[
            &[Some(Cell::text("a")), Some(Cell::text("b"))],
            &[Some(Cell::text("c")), Some(Cell::text("d"))],
            &[Some(Cell::text("e")), Some(Cell::text("f"))],
        ]);
        assert!(sheet.range_values(2..2, 0..2).unwrap().is_empty());
        assert!(sheet.range_values(0..2, 1..1).unwrap().is_empty());
        // start past end is degenerate, not fatal
        #[allow(clippy::reversed_empty_ranges)]
        let out = sheet.range_values(2..1, 0..2).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn window_ends_are_validated_against_physical_extents() {
        let sheet = sheet_with(&[
            &[Some(Cell::text("a")), Some(Cell::text("b"))],
            &[Some(Cell::text("c")), Some(Cell::text("d"))],
        ]);
        assert!(matches!(
            sheet.range_values(0..3, 0..2),
            Err(Error::RowRangeOutOfBounds { end: 3, count: 2 })
        ));
        assert!(matches!(
            sheet.range_values(0..2, 0..5),
            Err(Error::ColumnRangeOutOfBounds { end: 5, count: 2 })
        ));
    }

    #[test]
    fn windowed_reads_emit_one_value_per_index() {
        let mut sheet = Sheet::new("w");
        sheet.row_mut(0).set_cell(0, Cell::text("a"));
        sheet.row_mut(0).set_cell(1, Cell::text("b"));
        sheet.row_mut(1).set_cell(1, Cell::number_with_format(
            7.0,
            crate::sheet::NumberFormat::new(2, "0.00"),
        ));
        let out = sheet.range_values(0..2, 0..2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], vec![CellValue::Null, CellValue::Number(7.0)]);
    }

    #[test]
    fn sheet_selection_by_name_or_index() {
        let mut workbook = Workbook::new();
        let mut sheet = Sheet::new("present");
        sheet.row_mut(0).set_cell(0, Cell::text("x"));
        workbook.push_sheet(sheet);

        assert_eq!(workbook.sheet_values("present").unwrap().len(), 1);
        // absent name: nothing to read
        assert!(workbook.sheet_values("absent").unwrap().is_empty());
        // out-of-range index: caller error
        assert!(matches!(
            workbook.sheet_values(3),
            Err(Error::SheetIndex(3))
        ));
    }

    #[test]
    fn start_only_reads_run_to_the_physical_extents() {
        let sheet = sheet_with(&[
            &[Some(Cell::text("h1")), Some(Cell::text("h2"))],
            &[Some(Cell::text("a")), Some(Cell::text("b"))],
            &[Some(Cell::text("c")), Some(Cell::text("d"))],
        ]);
        let mut workbook = Workbook::new();
        workbook.push_sheet(sheet);
        let rows = workbook.sheet_values_from(0, 1, 0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], CellValue::Text("a".into()));
        // a start past the extents degenerates to empty
        assert!(workbook.sheet_values_from(0, 9, 0).unwrap().is_empty());
    }
}
