//! Legacy codec round trips and BIFF primitive checks.

use std::collections::BTreeMap;
use std::io::Cursor;

use chrono::NaiveDate;

use crate::export::{Field, FieldResult, FieldSource, Record, SheetData, export, export_sheets};
use crate::factory::decode;
use crate::sheet::CellValue;

use super::biff::{self, ByteReader};

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
    export(&["a", "b"], records, "xls", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xls").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![text("a"), text("b")],
            vec![text("1"), text("x")],
            vec![text("2"), text("y")],
        ]
    );
}

struct Reading {
    station: String,
    value: f64,
    valid: bool,
    taken: chrono::NaiveDateTime,
}

impl FieldSource for Reading {
    fn fields(&self) -> Vec<(String, FieldResult)> {
        vec![
            ("station".into(), Ok(Field::from(self.station.clone()))),
            ("value".into(), Ok(Field::Float(self.value))),
            ("valid".into(), Ok(Field::Bool(self.valid))),
            ("taken".into(), Ok(Field::DateTime(self.taken))),
        ]
    }
}

#[test]
fn structured_records_round_trip_with_typed_cells() {
    let reading = Reading {
        station: "Köln-Süd".to_string(),
        value: 7.0,
        valid: false,
        taken: NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap(),
    };
    let mut cursor = Cursor::new(Vec::new());
    export(
        &["station", "value", "valid", "taken"],
        vec![Record::from_struct(reading)],
        "xls",
        &mut cursor,
        Some("%d.%m.%Y"),
    )
    .unwrap();

    let workbook = decode(&cursor.into_inner(), "xls").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    assert_eq!(
        rows[1],
        vec![
            text("Köln-Süd"),
            text("7"), // General-formatted numbers read back as text
            CellValue::Bool(false),
            text("01.06.2021"),
        ]
    );
}

#[test]
fn multi_sheet_export_keeps_names_and_selection_works() {
    let sheets = vec![
        SheetData::new("alpha", &["x"], vec![Record::Seq(vec![Field::from("1")])]),
        SheetData::new("beta", &["y"], vec![Record::Seq(vec![Field::from("2")])]),
    ];
    let mut cursor = Cursor::new(Vec::new());
    export_sheets(sheets, "xls", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xls").unwrap();
    assert_eq!(workbook.sheet_count(), 2);
    assert_eq!(
        workbook.sheet_values("beta").unwrap(),
        vec![vec![text("y")], vec![text("2")]]
    );
    // absent names read as empty, not as an error
    assert!(workbook.sheet_values("gamma").unwrap().is_empty());
}

#[test]
fn long_labels_are_clipped_to_the_inline_limit() {
    let records = vec![Record::Seq(vec![Field::from("x".repeat(300))])];
    let mut cursor = Cursor::new(Vec::new());
    export(&["col"], records, "xls", &mut cursor, None).unwrap();

    let workbook = decode(&cursor.into_inner(), "xls").unwrap();
    let rows = workbook.sheet_values(0).unwrap();
    let CellValue::Text(label) = &rows[1][0] else {
        panic!("expected text");
    };
    assert_eq!(label.chars().count(), 255);
}

#[test]
fn rk_values_decode_in_all_four_forms() {
    // tagged integer
    assert_eq!(biff::decode_rk(((1000i32 << 2) as u32) | 0x2), 1000.0);
    // negative tagged integer
    assert_eq!(biff::decode_rk(((-5i32 << 2) as u32) | 0x2), -5.0);
    // truncated float: high 32 bits of the IEEE double
    let raw = (1.5f64.to_bits() >> 32) as u32;
    assert_eq!(biff::decode_rk(raw), 1.5);
    // integer divided by 100
    assert_eq!(biff::decode_rk(((12345i32 << 2) as u32) | 0x3), 123.45);
}

#[test]
fn unicode_strings_round_trip_in_both_encodings() {
    for sample in ["plain ascii", "Grüße", "räkna 数字", ""] {
        let mut buf = Vec::new();
        biff::write_unicode_string(&mut buf, sample, true);
        let mut reader = ByteReader::new(&buf);
        let back = biff::read_unicode_string(&mut reader, true).unwrap();
        assert_eq!(back, sample);
        assert_eq!(reader.remaining(), 0);
    }
}

#[test]
fn shared_string_tables_survive_continuation_splits() {
    // string "wörld" in UTF-16, split after two units; the continuation
    // restates the option flags for the remainder
    let units: Vec<u16> = "wörld".encode_utf16().collect();
    let mut first = Vec::new();
    first.extend_from_slice(&2u32.to_le_bytes()); // total references
    first.extend_from_slice(&2u32.to_le_bytes()); // unique strings
    first.extend_from_slice(&5u16.to_le_bytes()); // "hello"
    first.push(0);
    first.extend_from_slice(b"hello");
    first.extend_from_slice(&5u16.to_le_bytes()); // "wörld", wide
    first.push(1);
    for unit in &units[..2] {
        first.extend_from_slice(&unit.to_le_bytes());
    }
    let mut second = Vec::new();
    second.push(1); // restated flags
    for unit in &units[2..] {
        second.extend_from_slice(&unit.to_le_bytes());
    }

    let strings = biff::parse_sst(&[&first, &second]).unwrap();
    assert_eq!(strings, vec!["hello".to_string(), "wörld".to_string()]);
}

#[test]
fn the_record_walker_reports_truncation() {
    let mut stream = Vec::new();
    biff::push_record(&mut stream, biff::DATEMODE, &1u16.to_le_bytes());
    stream.extend_from_slice(&[0x09, 0x08, 0xFF]); // header cut short

    let mut iter = biff::RecordIter::new(&stream);
    let first = iter.next().unwrap().unwrap();
    assert_eq!(first.id, biff::DATEMODE);
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}
