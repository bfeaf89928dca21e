mod common;

use std::io::Cursor;

use common::{BINARY, DbfBuilder, MemoBuilder, Trickle, init_logging, memo_ref, memo_ref_ascii};
use xbase_reader::{ErrorKind, MemoSource, ReaderOptions, Value, XBaseError, XBaseReader, XBaseType};

struct FoxProTable {
    dbf: Vec<u8>,
    fpt: Vec<u8>,
}

/// Visual FoxPro table with a text memo, a binary memo and a general field, block size 64.
fn foxpro_table() -> FoxProTable {
    let mut memo = MemoBuilder::new(64);
    let note_1 = memo.foxpro_block(1, "First note, with an accent: é".as_bytes());
    let scan_1 = memo.foxpro_block(0, &[0x89, b'P', b'N', b'G']);
    let long_text = "x".repeat(150);
    let note_2 = memo.foxpro_block(1, long_text.as_bytes());
    let ole_2 = memo.foxpro_block(2, &[1, 2, 3, 4, 5]);
    let note_3 = memo.foxpro_block(1, b"third");

    let dbf = DbfBuilder::new()
        .language(0x00)
        .file_flags(0x02)
        .field("ID", b'I', 4, 0)
        .field("NOTE", b'M', 4, 0)
        .field_with_flags("SCAN", b'M', 4, 0, BINARY)
        .field("OLE", b'G', 4, 0)
        .record(&[&1i32.to_le_bytes(), &memo_ref(note_1), &memo_ref(scan_1), &[0u8; 4]])
        .record(&[&2i32.to_le_bytes(), &memo_ref(note_2), &[0u8; 4], &memo_ref(ole_2)])
        .record(&[&3i32.to_le_bytes(), &memo_ref(note_3), b"    ", &[0u8; 4]])
        .build();
    FoxProTable { dbf, fpt: memo.build() }
}

fn assert_foxpro_rows<R: std::io::Read>(reader: &mut XBaseReader<'_, R>) {
    assert!(reader.read().expect("row 1"));
    assert_eq!(
        reader.get_string(1).expect("NOTE").as_deref(),
        Some("First note, with an accent: é")
    );
    assert_eq!(reader.get_bytes(2).expect("SCAN").as_deref(), Some(&[0x89, b'P', b'N', b'G'][..]));
    assert!(reader.is_null(3).expect("OLE"), "zero reference is null");

    assert!(reader.read().expect("row 2"));
    assert_eq!(reader.get_string(1).expect("NOTE").map(|s| s.len()), Some(150));
    assert!(reader.is_null(2).expect("SCAN"));
    assert_eq!(reader.get_bytes(3).expect("OLE").as_deref(), Some(&[1u8, 2, 3, 4, 5][..]));

    assert!(reader.read().expect("row 3"));
    assert_eq!(reader.get_string(1).expect("NOTE").as_deref(), Some("third"));
    assert!(reader.is_null(2).expect("SCAN"), "blank reference is null");
    assert!(!reader.read().expect("end"));
}

#[test]
fn foxpro_memos_from_a_seekable_stream() {
    init_logging();
    let table = foxpro_table();
    let memo = MemoSource::seekable(Cursor::new(table.fpt.as_slice()));
    let mut reader = XBaseReader::new(table.dbf.as_slice(), Some(memo), ReaderOptions::default())
        .expect("open with memo");

    let schema = reader.schema();
    assert_eq!(schema.get(1).map(|c| c.data_type), Some(XBaseType::Memo));
    assert!(schema.get(1).is_some_and(|c| c.is_long() && c.column_size().is_none()));
    assert_eq!(schema.get(1).map(|c| c.value_kind()), Some(xbase_reader::ValueKind::Text));
    assert_eq!(schema.get(2).map(|c| c.value_kind()), Some(xbase_reader::ValueKind::Binary));

    assert_foxpro_rows(&mut reader);
}

#[test]
fn foxpro_memos_from_a_forward_only_stream() {
    let table = foxpro_table();
    let memo = MemoSource::forward_only(Trickle::new(&table.fpt, 5));
    let mut reader = XBaseReader::new(table.dbf.as_slice(), Some(memo), ReaderOptions::default())
        .expect("open with forward-only memo");

    assert_foxpro_rows(&mut reader);
}

#[test]
fn repeated_access_reads_the_memo_once() {
    let table = foxpro_table();
    let memo = MemoSource::forward_only(Trickle::new(&table.fpt, 64));
    let mut reader = XBaseReader::new(table.dbf.as_slice(), Some(memo), ReaderOptions::default())
        .expect("open");

    assert!(reader.read().expect("row 1"));
    let first = reader.get_string(1).expect("NOTE");
    let again = reader.get_string(1).expect("NOTE again");
    assert_eq!(first, again, "a forward-only memo is served from the row cache");
    assert!(matches!(reader.get_value(1).expect("value"), Value::Text(_)));
}

#[test]
fn forward_only_stream_cannot_go_back() {
    let mut memo = MemoBuilder::new(512);
    let early = memo.foxpro_block(1, b"early");
    let late = memo.foxpro_block(1, b"late");
    let dbf = DbfBuilder::new()
        .field("NOTE", b'M', 4, 0)
        .record(&[&memo_ref(late)])
        .record(&[&memo_ref(early)])
        .build();
    let fpt = memo.build();

    {
        let source = MemoSource::forward_only(fpt.as_slice());
        let mut reader = XBaseReader::new(dbf.as_slice(), Some(source), ReaderOptions::default()).expect("open");

        assert!(reader.read().expect("row 1"));
        assert_eq!(reader.get_string(0).expect("late").as_deref(), Some("late"));
        assert!(reader.read().expect("row 2"));
        let err = reader.get_string(0).expect_err("block behind the stream position");
        assert_eq!(err.kind(), ErrorKind::MalformedData, "{}", err);
    }

    // The same layout works when the stream can seek.
    let source = MemoSource::seekable(Cursor::new(fpt));
    let mut reader = XBaseReader::new(dbf.as_slice(), Some(source), ReaderOptions::default()).expect("open");
    assert!(reader.read().expect("row 1"));
    assert!(reader.read().expect("row 2"));
    assert_eq!(reader.get_string(0).expect("early").as_deref(), Some("early"));
}

#[test]
fn dbase4_memo_with_ascii_references() {
    let mut memo = MemoBuilder::new(512);
    let first = memo.dbase4_block(b"dBase IV text");
    let second = memo.dbase4_block(&vec![b'y'; 700]);
    let dbf = DbfBuilder::new()
        .version(0x8b)
        .language(0x01)
        .field("REMARKS", b'M', 10, 0)
        .record(&[&memo_ref_ascii(first)])
        .record(&[&memo_ref_ascii(second)])
        .record(&[b""])
        .build();
    let fpt = memo.build();

    let source = MemoSource::seekable(Cursor::new(fpt));
    let mut reader = XBaseReader::new(dbf.as_slice(), Some(source), ReaderOptions::default()).expect("open");
    assert_eq!(reader.header().version, xbase_reader::XBaseVersion::DBase4Memo);

    assert!(reader.read().expect("row 1"));
    assert_eq!(reader.get_string(0).expect("first").as_deref(), Some("dBase IV text"));
    assert!(reader.read().expect("row 2"));
    assert_eq!(reader.get_string(0).expect("second").map(|s| s.len()), Some(700));
    assert!(reader.read().expect("row 3"));
    assert!(reader.is_null(0).expect("blank reference"));
}

#[test]
fn dbase3_memo_is_terminated_by_eof_bytes() {
    let mut memo = MemoBuilder::dbase3();
    let first = memo.dbase3_block(b"short");
    let text = "z".repeat(600);
    let second = memo.dbase3_block(text.as_bytes());
    let dbf = DbfBuilder::new()
        .version(0x83)
        .language(0x00)
        .field("NOTES", b'M', 10, 0)
        .record(&[&memo_ref_ascii(first)])
        .record(&[&memo_ref_ascii(second)])
        .build();
    let dbt = memo.build();

    let source = MemoSource::forward_only(dbt.as_slice());
    let mut reader = XBaseReader::new(dbf.as_slice(), Some(source), ReaderOptions::default()).expect("open");
    assert_eq!(reader.header().version, xbase_reader::XBaseVersion::FoxBasePlusMemo);

    assert!(reader.read().expect("row 1"));
    assert_eq!(reader.get_string(0).expect("first").as_deref(), Some("short"));
    assert!(reader.read().expect("row 2"));
    assert_eq!(reader.get_string(0).expect("second").as_deref(), Some(text.as_str()));
}

#[test]
fn missing_memo_fails_initialization_by_default() {
    let table = foxpro_table();
    match XBaseReader::new(table.dbf.as_slice(), None, ReaderOptions::default()) {
        Err(XBaseError::MissingMemo { ordinal, name }) => {
            assert_eq!(ordinal, 1);
            assert_eq!(name, "NOTE");
        }
        Err(other) => panic!("expected MissingMemo, got {}", other),
        Ok(_) => panic!("memo columns without a memo stream must fail"),
    }
}

#[test]
fn missing_memo_is_deferred_when_ignored() {
    let table = foxpro_table();
    let options = ReaderOptions::default().with_ignore_missing_memo(true);
    let mut reader = XBaseReader::new(table.dbf.as_slice(), None, options).expect("open without memo");

    assert!(reader.read().expect("row 1"));
    assert_eq!(reader.get_i32(0).expect("ID"), Some(1), "non-memo columns stay usable");
    assert!(!reader.is_null(1).expect("null test needs no memo"));

    let err = reader.get_string(1).expect_err("memo access");
    assert_eq!(err.kind(), ErrorKind::MissingMemo);
    assert!(
        matches!(&err, XBaseError::MissingMemo { ordinal: 1, name } if name == "NOTE"),
        "{}",
        err
    );
    assert!(reader.is_null(3).expect("OLE"), "a null memo needs no memo stream");
    assert_eq!(reader.get_value(3).expect("OLE"), Value::Null);

    let mut buf = [0u8; 4];
    assert_eq!(reader.read_bytes(2, 0, &mut buf).expect_err("SCAN").kind(), ErrorKind::MissingMemo);

    assert!(!reader.is_closed(), "a missing memo does not close the reader");
    assert!(reader.read().expect("row 2"));
}

#[test]
fn chunked_reads_of_memo_values() {
    let table = foxpro_table();
    let memo = MemoSource::forward_only(table.fpt.as_slice());
    let mut reader = XBaseReader::new(table.dbf.as_slice(), Some(memo), ReaderOptions::default()).expect("open");

    assert!(reader.read().expect("row 1"));
    let mut chars = ['\0'; 8];
    let mut text = String::new();
    let mut offset = 0;
    loop {
        let n = reader.read_chars(1, offset, &mut chars).expect("chunk");
        if n == 0 {
            break;
        }
        text.extend(&chars[..n]);
        offset += n;
    }
    assert_eq!(text, "First note, with an accent: é");

    let mut bytes = [0u8; 3];
    assert_eq!(reader.read_bytes(2, 0, &mut bytes).expect("first window"), 3);
    assert_eq!(bytes, [0x89, b'P', b'N']);
    assert_eq!(reader.read_bytes(2, 3, &mut bytes).expect("second window"), 1);
    assert_eq!(bytes[0], b'G');
    assert_eq!(reader.read_bytes(2, 4, &mut bytes).expect("past end"), 0);
    assert_eq!(reader.read_bytes(3, 0, &mut bytes).expect("null OLE"), 0);

    // Raw text memo bytes are available too.
    let mut head = [0u8; 5];
    assert_eq!(reader.read_bytes(1, 0, &mut head).expect("text memo bytes"), 5);
    assert_eq!(&head, b"First");
}

#[test]
fn memo_reference_past_the_end_is_malformed() {
    let memo = MemoBuilder::new(64);
    let dbf = DbfBuilder::new()
        .field("NOTE", b'M', 4, 0)
        .record(&[&memo_ref(500)])
        .build();
    let fpt = memo.build();

    let source = MemoSource::seekable(Cursor::new(fpt));
    let mut reader = XBaseReader::new(dbf.as_slice(), Some(source), ReaderOptions::default()).expect("open");
    assert!(reader.read().expect("row"));
    assert_eq!(reader.get_string(0).expect_err("no such block").kind(), ErrorKind::MalformedData);
}

#[test]
fn truncated_memo_header_is_malformed() {
    let table = foxpro_table();
    let memo = MemoSource::seekable(Cursor::new(&table.fpt[..100]));
    let err = XBaseReader::new(table.dbf.as_slice(), Some(memo), ReaderOptions::default())
        .expect_err("short memo header");
    assert_eq!(err.kind(), ErrorKind::MalformedData);
}

#[test]
fn files_on_disk() {
    let table = foxpro_table();
    let dir = std::env::temp_dir().join(format!("xbase-reader-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let dbf_path = dir.join("notes.dbf");
    let fpt_path = dir.join("notes.fpt");
    std::fs::write(&dbf_path, &table.dbf).expect("write dbf");
    std::fs::write(&fpt_path, &table.fpt).expect("write fpt");

    let mut reader =
        XBaseReader::open(&dbf_path, Some(fpt_path.as_path()), ReaderOptions::default()).expect("open from disk");
    assert_foxpro_rows(&mut reader);
    reader.close();

    std::fs::remove_dir_all(&dir).expect("clean up");
}
