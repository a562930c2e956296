//! OK packet parsing, grounded on `connection/src/packet/ok_packet.rs`.

use byteorder::{ByteOrder, LittleEndian};
use common::codec::decode_len_enc_int;
use common::error::Error;

use crate::status::StatusFlags;

#[derive(Debug, Clone)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
}

impl OkPacket {
    pub fn parse(packet: &[u8]) -> Result<Self, Error> {
        let buf = &packet[1..];
        let mut offset = 0usize;

        let (affected_rows, _, n) = decode_len_enc_int(&buf[offset..])?;
        offset += n;
        let (last_insert_id, _, n) = decode_len_enc_int(&buf[offset..])?;
        offset += n;

        let status = if buf.len() >= offset + 2 {
            LittleEndian::read_u16(&buf[offset..offset + 2])
        } else {
            0
        };
        offset += 2;
        let warnings = if buf.len() >= offset + 2 {
            LittleEndian::read_u16(&buf[offset..offset + 2])
        } else {
            0
        };

        Ok(Self {
            affected_rows,
            last_insert_id,
            status_flags: StatusFlags::from_bits_truncate(status),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_ok_packet() {
        let mut raw = vec![0x00, 0x00, 0x00];
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        let ok = OkPacket::parse(&raw).unwrap();
        assert_eq!(ok.affected_rows, 0);
        assert_eq!(ok.last_insert_id, 0);
        assert!(ok.status_flags.contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }
}
