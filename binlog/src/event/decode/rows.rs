//! Structural decoding of write/update/delete-rows events:
//! `[table_id:u48le][flags:u16le]`, optionally `[extra_data_len:u16le][extra_data]`
//! for V2 events, `[columns:lenenc]`, then one or two present-columns
//! bitmaps. The row payloads themselves are left untouched — splitting
//! them into individual rows requires walking cell widths against the
//! table map, which is the stream assembler's job.

use byteorder::{ByteOrder, LittleEndian};

use common::codec::{decode_len_enc_int, Bitmap};
use common::error::{ProtocolError, Result};

pub struct RowsEventHeader {
    pub table_id: u64,
    pub column_count: usize,
    /// Present for update/delete: which columns appear in the "before"
    /// (identify) image.
    pub identify_columns: Option<Bitmap>,
    /// Present for write/update: which columns appear in the "after"
    /// (data) image.
    pub data_columns: Option<Bitmap>,
}

/// Parses the fixed framing and returns the header plus the remaining,
/// still-encoded row payloads.
pub fn decode(body: &[u8], has_identify: bool, has_data: bool, v2: bool) -> Result<(RowsEventHeader, &[u8])> {
    let mut offset = 0usize;

    let id_bytes = body
        .get(0..6)
        .ok_or_else(|| truncated("rows event shorter than its table id"))?;
    let mut padded = [0u8; 8];
    padded[..6].copy_from_slice(id_bytes);
    let table_id = LittleEndian::read_u64(&padded);
    offset += 6;

    offset += 2; // flags, unused

    if v2 {
        let extra_len = body
            .get(offset..offset + 2)
            .map(LittleEndian::read_u16)
            .ok_or_else(|| truncated("rows event missing V2 extra-data length"))? as usize;
        if extra_len < 2 {
            return Err(truncated("rows event V2 extra-data length shorter than itself"));
        }
        offset += extra_len;
    }

    let (column_count, _, consumed) = decode_len_enc_int(&body[offset..])?;
    offset += consumed;
    let column_count = column_count as usize;
    let bitmap_len = (column_count + 7) / 8;

    let identify_columns = if has_identify {
        let bytes = body
            .get(offset..offset + bitmap_len)
            .ok_or_else(|| truncated("rows event missing identify-columns bitmap"))?;
        offset += bitmap_len;
        Some(Bitmap::from_bytes(bytes, column_count)?)
    } else {
        None
    };

    let data_columns = if has_data {
        let bytes = body
            .get(offset..offset + bitmap_len)
            .ok_or_else(|| truncated("rows event missing data-columns bitmap"))?;
        offset += bitmap_len;
        Some(Bitmap::from_bytes(bytes, column_count)?)
    } else {
        None
    };

    let rows_blob = body
        .get(offset..)
        .ok_or_else(|| truncated("rows event missing row payload"))?;

    Ok((
        RowsEventHeader {
            table_id,
            column_count,
            identify_columns,
            data_columns,
        },
        rows_blob,
    ))
}

fn truncated(msg: &str) -> common::error::Error {
    ProtocolError::Malformed(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_write_rows_framing() {
        let mut body = vec![0x06, 0x05, 0x04, 0x03, 0x02, 0x01];
        body.extend_from_slice(&0u16.to_le_bytes()); // flags
        body.push(2); // column count
        body.push(0b0000_0011); // present bitmap: both columns
        body.extend_from_slice(b"row-payload-bytes");

        let (header, blob) = decode(&body, false, true, false).unwrap();
        assert_eq!(header.table_id, 0x01_02_03_04_05_06);
        assert_eq!(header.column_count, 2);
        assert!(header.identify_columns.is_none());
        assert_eq!(header.data_columns.unwrap().count(), 2);
        assert_eq!(blob, b"row-payload-bytes");
    }

    #[test]
    fn decodes_update_rows_two_bitmaps() {
        let mut body = vec![0x01, 0, 0, 0, 0, 0];
        body.extend_from_slice(&0u16.to_le_bytes());
        body.push(1); // column count
        body.push(0b1); // identify bitmap
        body.push(0b1); // data bitmap
        body.extend_from_slice(b"x");

        let (header, blob) = decode(&body, true, true, false).unwrap();
        assert!(header.identify_columns.is_some());
        assert!(header.data_columns.is_some());
        assert_eq!(blob, b"x");
    }

    #[test]
    fn v2_skips_extra_data() {
        let mut body = vec![0x01, 0, 0, 0, 0, 0];
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&4u16.to_le_bytes()); // extra_data_len counts itself: 2 + 2 payload bytes
        body.extend_from_slice(&[0xAA, 0xBB]);
        body.push(1);
        body.push(0b1);
        body.extend_from_slice(b"y");

        let (header, blob) = decode(&body, false, true, true).unwrap();
        assert_eq!(header.column_count, 1);
        assert_eq!(blob, b"y");
    }

    #[test]
    fn v2_with_no_extra_data_advances_by_two() {
        let mut body = vec![0x01, 0, 0, 0, 0, 0];
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes()); // extra_data_len == 2: no payload beyond itself
        body.push(1);
        body.push(0b1);
        body.extend_from_slice(b"z");

        let (header, blob) = decode(&body, false, true, true).unwrap();
        assert_eq!(header.column_count, 1);
        assert_eq!(blob, b"z");
    }
}
