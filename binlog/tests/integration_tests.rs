//! Black-box coverage of the stream assembler's end-to-end scenarios: each
//! test feeds a hand-built sequence of raw events and checks the
//! `Transaction`s that come out.

use std::collections::HashMap;

use binlog::event::{EventHeader, EventKind, RawEvent};
use binlog::{Assembler, BinlogPosition, ColumnSchema, TableInfoMapper};
use common::error::Result;

struct StaticMapper(HashMap<(String, String), Vec<ColumnSchema>>);

impl TableInfoMapper for StaticMapper {
    fn columns(&self, database: &str, table: &str) -> Result<Vec<ColumnSchema>> {
        self.0
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| common::error::ProtocolError::Malformed(format!("unknown table {database}.{table}")).into())
    }
}

fn mapper() -> StaticMapper {
    let mut tables = HashMap::new();
    tables.insert(
        ("vt_test_keyspace".to_string(), "vt_a".to_string()),
        vec![ColumnSchema::new("id", false), ColumnSchema::new("message", false)],
    );
    StaticMapper(tables)
}

fn event_kind(type_code: u8) -> EventKind {
    match type_code {
        2 => EventKind::Query,
        4 => EventKind::Rotate,
        15 => EventKind::FormatDescription,
        16 => EventKind::Xid,
        19 => EventKind::TableMap,
        23 => EventKind::WriteRows { v2: false },
        24 => EventKind::UpdateRows { v2: false },
        25 => EventKind::DeleteRows { v2: false },
        other => EventKind::Other(other),
    }
}

fn raw(type_code: u8, next_position: u32, body: Vec<u8>) -> RawEvent {
    const COMMON_HEADER_LEN: usize = 19;
    let header = EventHeader {
        timestamp: 1_700_000_000,
        type_code,
        server_id: 7,
        event_length: (COMMON_HEADER_LEN + body.len()) as u32,
        next_position,
        flags: 0,
    };
    RawEvent {
        header,
        kind: event_kind(type_code),
        body,
    }
}

fn format_description_with_crc32() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&4u16.to_le_bytes());
    let mut server_version = b"5.6.51-log".to_vec();
    server_version.resize(50, 0);
    body.extend_from_slice(&server_version);
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(19); // header_length
    body.extend_from_slice(&[19, 0, 19, 19, 19]); // toy post-header table
    body.push(1); // checksum marker: crc32
    body.extend_from_slice(&[0, 0, 0, 0]); // this event's own (unverified) CRC tail
    body
}

fn rotate_body(filename: &str, position: u64) -> Vec<u8> {
    let mut body = position.to_le_bytes().to_vec();
    body.extend_from_slice(filename.as_bytes());
    body
}

fn table_map_body(table_id: u64) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&table_id.to_le_bytes()[..6]);
    body.extend_from_slice(&0u16.to_le_bytes()); // flags
    body.push(16);
    body.extend_from_slice(b"vt_test_keyspace");
    body.push(0);
    body.push(4);
    body.extend_from_slice(b"vt_a");
    body.push(0);
    body.push(2); // column count
    body.push(3); // Long
    body.push(15); // VarChar
    body.push(4); // metadata_len lenenc
    body.extend_from_slice(&384u16.to_le_bytes());
    body.push(0b0000_0010); // only `message` nullable
    body
}

fn query_body(sql: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_le_bytes()); // slave_proxy_id
    body.extend_from_slice(&16u32.to_le_bytes()); // execution_time (byte 4 doubles as schema_len below)
    body.extend_from_slice(&0u16.to_le_bytes()); // error_code
    body.extend_from_slice(&0u16.to_le_bytes()); // status_vars_len
    body.extend_from_slice(b"vt_test_keyspace");
    body.push(0);
    body.extend_from_slice(sql.as_bytes());
    body
}

fn row_image(message: &str) -> Vec<u8> {
    let mut row = vec![0x10, 0x20, 0x30, 0x40]; // id = 0x40302010 little-endian
    row.extend_from_slice(&(message.len() as u16).to_le_bytes());
    row.extend_from_slice(message.as_bytes());
    row
}

fn write_rows_body(table_id: u64, message: &str) -> Vec<u8> {
    let mut body = table_id.to_le_bytes()[..6].to_vec();
    body.extend_from_slice(&0u16.to_le_bytes());
    body.push(2); // column count
    body.push(0b0000_0011); // present bitmap
    body.push(0b0000_0000); // null bitmap: neither column null
    body.extend_from_slice(&row_image(message));
    body
}

fn update_rows_body(table_id: u64, before: &str, after: &str) -> Vec<u8> {
    let mut body = table_id.to_le_bytes()[..6].to_vec();
    body.extend_from_slice(&0u16.to_le_bytes());
    body.push(2);
    body.push(0b0000_0011); // identify bitmap
    body.push(0b0000_0011); // data bitmap
    body.push(0b0000_0000); // identify null bitmap
    body.extend_from_slice(&row_image(before));
    body.push(0b0000_0000); // data null bitmap
    body.extend_from_slice(&row_image(after));
    body
}

fn delete_rows_body(table_id: u64, before: &str) -> Vec<u8> {
    let mut body = table_id.to_le_bytes()[..6].to_vec();
    body.extend_from_slice(&0u16.to_le_bytes());
    body.push(2);
    body.push(0b0000_0011); // identify bitmap
    body.push(0b0000_0000); // null bitmap
    body.extend_from_slice(&row_image(before));
    body
}

fn xid_body(xid: u64) -> Vec<u8> {
    xid.to_le_bytes().to_vec()
}

/// A full three-statement transaction: rotate, format-description
/// (checksum=crc32), table-map, `BEGIN`, insert, update, delete, `XID` —
/// one Transaction with three statements and the position threaded
/// through correctly.
#[test]
fn three_event_transaction_assembles_insert_update_delete() {
    let mut asm = Assembler::new(mapper(), BinlogPosition::new("binlog.000005", 0));
    let table_id = 0x01_02_03_04_05_06;

    assert!(asm.handle(raw(4, 4, rotate_body("binlog.000005", 0))).unwrap().is_none());
    assert!(asm.handle(raw(15, 200, format_description_with_crc32())).unwrap().is_none());
    assert!(asm.handle(raw(19, 300, table_map_body(table_id))).unwrap().is_none());
    assert!(asm.handle(raw(2, 350, query_body("BEGIN"))).unwrap().is_none());
    assert!(asm.handle(raw(23, 500, write_rows_body(table_id, "abcd"))).unwrap().is_none());
    assert!(asm
        .handle(raw(24, 650, update_rows_body(table_id, "abc", "abcd")))
        .unwrap()
        .is_none());
    assert!(asm.handle(raw(25, 800, delete_rows_body(table_id, "abc"))).unwrap().is_none());

    let tran = asm.handle(raw(16, 900, xid_body(99))).unwrap().unwrap();

    assert_eq!(tran.now, BinlogPosition::new("binlog.000005", 4));
    assert_eq!(tran.next, BinlogPosition::new("binlog.000005", 900));
    assert_eq!(tran.statements.len(), 3);

    let insert = &tran.statements[0];
    assert_eq!(insert.row_values.len(), 1);
    assert_eq!(insert.row_values[0].columns[0].data.as_deref(), Some(b"1076895760".as_slice()));
    assert_eq!(insert.row_values[0].columns[1].data.as_deref(), Some(b"abcd".as_slice()));

    let update = &tran.statements[1];
    assert_eq!(update.row_identifies[0].columns[1].data.as_deref(), Some(b"abc".as_slice()));
    assert_eq!(update.row_values[0].columns[1].data.as_deref(), Some(b"abcd".as_slice()));

    let delete = &tran.statements[2];
    assert_eq!(delete.row_identifies[0].columns[1].data.as_deref(), Some(b"abc".as_slice()));
    assert!(delete.row_values.is_empty());
}

/// A rotate mid-stream updates tracked position without emitting a
/// transaction.
#[test]
fn rotate_mid_stream_updates_position_without_a_transaction() {
    let mut asm = Assembler::new(mapper(), BinlogPosition::new("binlog.000001", 4));
    assert!(asm.handle(raw(15, 100, format_description_with_crc32())).unwrap().is_none());

    let result = asm.handle(raw(4, 4, rotate_body("binlog.000002", 4))).unwrap();
    assert!(result.is_none());
    assert_eq!(asm.position(), &BinlogPosition::new("binlog.000002", 4));
}

/// `BEGIN`, a write, then `ROLLBACK` — the transaction commits empty and
/// the buffered write is discarded.
#[test]
fn rollback_discards_buffered_events() {
    let mut asm = Assembler::new(mapper(), BinlogPosition::new("binlog.000001", 4));
    let table_id = 0x02;

    asm.handle(raw(15, 100, format_description_with_crc32())).unwrap();
    asm.handle(raw(19, 200, table_map_body(table_id))).unwrap();
    asm.handle(raw(2, 250, query_body("BEGIN"))).unwrap();
    assert!(asm.handle(raw(23, 400, write_rows_body(table_id, "x"))).unwrap().is_none());

    let tran = asm.handle(raw(2, 500, query_body("ROLLBACK"))).unwrap().unwrap();
    assert!(tran.statements.is_empty());
    assert_eq!(tran.next, BinlogPosition::new("binlog.000001", 500));
}
