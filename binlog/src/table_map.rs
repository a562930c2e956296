//! Table-map event payload decoding: table id, database/table names,
//! column types, per-column metadata, and the nullability bitmap. MySQL
//! 5.6+'s "extra metadata" tail (enum values, column visibility, charset
//! ids) is dropped — nothing downstream needs it.

use byteorder::{ByteOrder, LittleEndian};

use common::codec::{decode_len_enc_int, Bitmap};
use common::error::{ProtocolError, Result};

use crate::column_type::ColumnType;

/// Per-table metadata learned from a table-map event, keyed by its 6-byte
/// numeric id for the lifetime of the stream. Entries are re-bound (same
/// id, new metadata) whenever the master re-emits a table-map after DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    pub table_id: u64,
    pub database: String,
    pub table: String,
    pub column_types: Vec<ColumnType>,
    /// Per-column metadata, type-specific in meaning; see [`ColumnType::metadata_width`].
    pub metadata: Vec<u16>,
    pub can_be_null: Bitmap,
}

impl TableMap {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut offset = 0usize;

        let table_id = read_table_id(body, &mut offset)?;
        let _flags = read_u16(body, &mut offset)?;

        let database = read_null_terminated_str(body, &mut offset)?;
        let table = read_null_terminated_str(body, &mut offset)?;

        let (column_count, _, consumed) = decode_len_enc_int(&body[offset..])?;
        offset += consumed;
        let column_count = column_count as usize;

        let type_codes = body.get(offset..offset + column_count).ok_or_else(|| {
            malformed("truncated table-map column-type list")
        })?;
        offset += column_count;
        let column_types = type_codes
            .iter()
            .map(|&code| ColumnType::from_code(code))
            .collect::<Result<Vec<_>>>()?;

        let (_metadata_len, _, consumed) = decode_len_enc_int(&body[offset..])?;
        offset += consumed;

        let metadata = parse_metadata(body, &mut offset, &column_types)?;

        let bitmap_len = (column_count + 7) / 8;
        let bitmap_bytes = body
            .get(offset..offset + bitmap_len)
            .ok_or_else(|| malformed("truncated table-map nullability bitmap"))?;
        let can_be_null = Bitmap::from_bytes(bitmap_bytes, column_count)?;

        Ok(Self {
            table_id,
            database,
            table,
            column_types,
            metadata,
            can_be_null,
        })
    }
}

fn parse_metadata(body: &[u8], offset: &mut usize, types: &[ColumnType]) -> Result<Vec<u16>> {
    let mut metadata = Vec::with_capacity(types.len());
    for column_type in types {
        let value = match column_type.metadata_width() {
            0 => 0u16,
            1 => {
                let byte = *body
                    .get(*offset)
                    .ok_or_else(|| malformed("truncated 1-byte column metadata"))?;
                *offset += 1;
                byte as u16
            }
            2 => {
                let b0 = *body
                    .get(*offset)
                    .ok_or_else(|| malformed("truncated 2-byte column metadata"))?;
                let b1 = *body
                    .get(*offset + 1)
                    .ok_or_else(|| malformed("truncated 2-byte column metadata"))?;
                *offset += 2;
                match column_type {
                    ColumnType::VarChar | ColumnType::Bit => LittleEndian::read_u16(&[b0, b1]),
                    _ => ((b0 as u16) << 8) | b1 as u16,
                }
            }
            other => return Err(malformed(&format!("unexpected metadata width {other}"))),
        };
        metadata.push(value);
    }
    Ok(metadata)
}

fn read_table_id(body: &[u8], offset: &mut usize) -> Result<u64> {
    let bytes = body
        .get(*offset..*offset + 6)
        .ok_or_else(|| malformed("truncated table-map table id"))?;
    *offset += 6;
    let mut padded = [0u8; 8];
    padded[..6].copy_from_slice(bytes);
    Ok(LittleEndian::read_u64(&padded))
}

fn read_u16(body: &[u8], offset: &mut usize) -> Result<u16> {
    let bytes = body
        .get(*offset..*offset + 2)
        .ok_or_else(|| malformed("truncated table-map field"))?;
    *offset += 2;
    Ok(LittleEndian::read_u16(bytes))
}

fn read_null_terminated_str(body: &[u8], offset: &mut usize) -> Result<String> {
    let len = *body
        .get(*offset)
        .ok_or_else(|| malformed("truncated table-map name length"))? as usize;
    *offset += 1;
    let bytes = body
        .get(*offset..*offset + len)
        .ok_or_else(|| malformed("truncated table-map name"))?;
    *offset += len;
    let term = *body
        .get(*offset)
        .ok_or_else(|| malformed("missing table-map name terminator"))?;
    if term != 0 {
        return Err(malformed("table-map name missing null terminator"));
    }
    *offset += 1;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn malformed(msg: &str) -> common::error::Error {
    ProtocolError::Malformed(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x06, 0x05, 0x04, 0x03, 0x02, 0x01]); // table_id le48
        body.extend_from_slice(&0u16.to_le_bytes()); // flags
        body.push(16);
        body.extend_from_slice(b"vt_test_keyspace");
        body.push(0);
        body.push(4);
        body.extend_from_slice(b"vt_a");
        body.push(0);
        body.push(2); // column_count (lenenc single byte)
        body.push(3); // Long
        body.push(15); // VarChar
        body.push(4); // metadata_len lenenc
        body.extend_from_slice(&384u16.to_le_bytes()); // varchar max length metadata
        body.push(0b0000_0010); // bit 1 (message) nullable
        body
    }

    #[test]
    fn parses_sample_table_map() {
        let tm = TableMap::parse(&sample_body()).unwrap();
        assert_eq!(tm.table_id, 0x01_02_03_04_05_06);
        assert_eq!(tm.database, "vt_test_keyspace");
        assert_eq!(tm.table, "vt_a");
        assert_eq!(tm.column_types, vec![ColumnType::Long, ColumnType::VarChar]);
        assert_eq!(tm.metadata, vec![0, 384]);
        assert!(!tm.can_be_null.bit(0));
        assert!(tm.can_be_null.bit(1));
    }

    #[test]
    fn rejects_truncated_body() {
        let body = sample_body();
        assert!(TableMap::parse(&body[..5]).is_err());
    }
}
