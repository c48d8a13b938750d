//! Round trips through the package writer and reader.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use chrono::NaiveDate;

use crate::export::{Field, FieldResult, FieldSource, Record, SheetData, export, export_sheets};
use crate::factory::{WriteCell, decode};
use crate::ooxml::writer::XlsxBookWriter;
use crate::sheet::CellValue;

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn map(pairs: &[(&str, Field)]) -> Record {
    Record::Map(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn export_then_decode_round_trips_header_and_rows() {
    let records = vec![
        map(&[("a", Field::from(1)), ("b", Field::from("x"))]),
        map(&[("a", Field::from(2)), ("b", Field::from("y"))]),
    ];
    let mut cursor = Cursor::new(Vec::new());
    export(&["a", "b"], records, "xlsx", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xlsx").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    // mapping values are stringified on write, so numbers come back as text
    assert_eq!(
        rows,
        vec![
            vec![text("a"), text("b")],
            vec![text("1"), text("x")],
            vec![text("2"), text("y")],
        ]
    );
}

#[test]
fn sequence_rows_keep_cells_past_the_header_band() {
    let records = vec![Record::Seq(vec![
        Field::from(10),
        Field::Null,
        Field::from(30),
    ])];
    let mut cursor = Cursor::new(Vec::new());
    export(&["a", "b"], records, "xlsx", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xlsx").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    // two headers, but the positional row still lands its third cell
    assert_eq!(
        rows[1],
        vec![text("10"), CellValue::Null, text("30")]
    );
}

struct Order {
    id: i64,
    total: f64,
    paid: bool,
    placed: chrono::NaiveDateTime,
}

impl FieldSource for Order {
    fn fields(&self) -> Vec<(String, FieldResult)> {
        vec![
            ("id".into(), Ok(Field::Int(self.id))),
            ("total".into(), Ok(Field::Float(self.total))),
            ("paid".into(), Ok(Field::Bool(self.paid))),
            ("placed".into(), Ok(Field::DateTime(self.placed))),
            ("shipped".into(), Err("not loaded".into())),
        ]
    }
}

#[test]
fn structured_records_round_trip_with_typed_cells() {
    let order = Order {
        id: 42,
        total: 3.0,
        paid: true,
        placed: NaiveDate::from_ymd_opt(2016, 11, 10)
            .unwrap()
            .and_hms_opt(14, 10, 57)
            .unwrap(),
    };
    let mut cursor = Cursor::new(Vec::new());
    export(
        &["id", "total", "paid", "placed", "shipped"],
        vec![Record::from_struct(order)],
        "xlsx",
        &mut cursor,
        None,
    )
    .unwrap();

    let workbook = decode(&cursor.into_inner(), "xlsx").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    // numeric cells carry the General format, so they coerce to text
    assert_eq!(
        rows[1],
        vec![
            text("42"),
            text("3"),
            CellValue::Bool(true),
            text("2016-11-10"),
            CellValue::Null, // the failed field's cell stayed empty
        ]
    );
}

#[test]
fn multi_sheet_export_keeps_names_and_order() {
    let sheets = vec![
        SheetData::new("first", &["a"], vec![Record::Seq(vec![Field::from("1")])]),
        SheetData::new("second", &["b"], vec![Record::Seq(vec![Field::from("2")])]),
    ];
    let mut cursor = Cursor::new(Vec::new());
    export_sheets(sheets, "xlsx", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xlsx").unwrap();
    assert_eq!(workbook.sheet_count(), 2);
    assert_eq!(workbook.sheets()[0].name(), "first");
    assert_eq!(workbook.sheets()[1].name(), "second");
    assert_eq!(
        workbook.sheet_values("second").unwrap(),
        vec![vec![text("b")], vec![text("2")]]
    );
}

#[test]
fn an_empty_dataset_list_produces_no_artifact() {
    let mut cursor = Cursor::new(Vec::new());
    export_sheets(Vec::new(), "xlsx", &mut cursor, None).unwrap();
    assert!(cursor.into_inner().is_empty());
}

#[test]
fn the_streaming_window_bounds_resident_rows() {
    let mut writer = XlsxBookWriter::new();
    let sheet = writer.add_sheet("big").unwrap();
    for i in 0..50_000u32 {
        writer
            .append_row(sheet, &[WriteCell::Text(format!("row {i}"))])
            .unwrap();
        assert!(writer.resident_row_count(sheet) <= 5_000);
    }
    assert_eq!(writer.total_row_count(sheet), 50_000);
    // flushed rows are no longer readable from the live workbook
    assert!(writer.row(sheet, 0).is_none());
    assert!(writer.row(sheet, 44_999).is_none());
    assert_eq!(
        writer.row(sheet, 49_999),
        Some(&[WriteCell::Text("row 49999".to_string())][..])
    );

    let mut cursor = Cursor::new(Vec::new());
    writer.finish(&mut cursor).unwrap();
    let workbook = decode(&cursor.into_inner(), "xlsx").unwrap();
    assert_eq!(workbook.sheet_values(0).unwrap().len(), 50_000);
}

/// A hand-built package covering the reader paths our own writer never
/// emits: shared strings (with rich runs), style-bound date and numeric
/// formats, cached formula results, and error cells.
#[test]
fn foreign_packages_decode_through_shared_strings_and_styles() {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    let mut put = |name: &str, body: &str| {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    };

    put(
        "[Content_Types].xml",
        r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
    );
    put(
        "xl/workbook.xml",
        r#"<?xml version="1.0"?><workbook><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
    );
    put(
        "xl/_rels/workbook.xml.rels",
        r#"<?xml version="1.0"?><Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#,
    );
    put(
        "xl/sharedStrings.xml",
        r#"<?xml version="1.0"?><sst><si><t>hello</t></si><si><r><t>a</t></r><r><t>b</t></r></si></sst>"#,
    );
    put(
        "xl/styles.xml",
        r#"<?xml version="1.0"?><styleSheet><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="2"/></cellXfs></styleSheet>"#,
    );
    put(
        "xl/worksheets/sheet1.xml",
        concat!(
            r#"<?xml version="1.0"?><worksheet><sheetData>"#,
            r#"<row r="1">"#,
            r#"<c r="A1" t="s"><v>0</v></c>"#,
            r#"<c r="B1" s="1"><v>45000</v></c>"#,
            r#"<c r="C1" s="2"><v>1234.5</v></c>"#,
            r#"<c r="D1"><v>1234</v></c>"#,
            r#"<c r="E1" t="e"><v>#DIV/0!</v></c>"#,
            r#"<c r="F1"><f>1+1</f><v>2</v></c>"#,
            r#"<c r="G1" t="b"><v>1</v></c>"#,
            r#"<c r="H1" t="s"><v>1</v></c>"#,
            r#"</row>"#,
            r#"</sheetData></worksheet>"#,
        ),
    );
    let bytes = zip.finish().unwrap().into_inner();

    let workbook = decode(&bytes, "xlsx").unwrap();
    let rows = workbook.sheet_values("Data").unwrap();
    let expected_date = NaiveDate::from_ymd_opt(2023, 3, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(
        rows,
        vec![vec![
            text("hello"),
            CellValue::DateTime(expected_date),
            CellValue::Number(1234.5),
            text("1234"),
            CellValue::Error("#DIV/0!".into()),
            CellValue::Number(2.0),
            CellValue::Bool(true),
            text("ab"),
        ]]
    );
}
