//! Binlog event header: the fixed 19-byte prefix common to every event,
//! carrying the timestamp, type code, server id, total length, next
//! position, and flags.

use byteorder::{ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

pub const COMMON_HEADER_LEN: usize = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub timestamp: u32,
    pub type_code: u8,
    pub server_id: u32,
    pub event_length: u32,
    pub next_position: u32,
    pub flags: u16,
}

impl EventHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.get(..COMMON_HEADER_LEN).ok_or_else(|| {
            ProtocolError::Malformed("event header shorter than 19 bytes".to_string())
        })?;
        Ok(Self {
            timestamp: LittleEndian::read_u32(&bytes[0..4]),
            type_code: bytes[4],
            server_id: LittleEndian::read_u32(&bytes[5..9]),
            event_length: LittleEndian::read_u32(&bytes[9..13]),
            next_position: LittleEndian::read_u32(&bytes[13..17]),
            flags: LittleEndian::read_u16(&bytes[17..19]),
        })
    }
}
