//! Converts raw dump-stream packets into typed binlog events. Event kind
//! is represented as a tagged sum ([`EventKind`]) rather than a set of
//! boolean predicates, so the assembler can dispatch on it with an
//! exhaustive match.

use connection::packet::ErrorPacket;
use common::error::{Error, ProtocolError, Result};

use crate::format::{BinlogFormat, ChecksumAlgorithm};

use super::header::{EventHeader, COMMON_HEADER_LEN};

const STATUS_EVENT: u8 = 0x00;
const STATUS_EOF: u8 = 0xFE;
const STATUS_ERROR: u8 = 0xFF;

const QUERY_EVENT: u8 = 2;
const ROTATE_EVENT: u8 = 4;
const INTVAR_EVENT: u8 = 5;
const RAND_EVENT: u8 = 13;
const FORMAT_DESCRIPTION_EVENT: u8 = 15;
const XID_EVENT: u8 = 16;
const TABLE_MAP_EVENT: u8 = 19;
const WRITE_ROWS_EVENT_V1: u8 = 23;
const UPDATE_ROWS_EVENT_V1: u8 = 24;
const DELETE_ROWS_EVENT_V1: u8 = 25;
const ROWS_QUERY_EVENT: u8 = 29;
const WRITE_ROWS_EVENT_V2: u8 = 30;
const UPDATE_ROWS_EVENT_V2: u8 = 31;
const DELETE_ROWS_EVENT_V2: u8 = 32;
const GTID_EVENT: u8 = 33;
const ANONYMOUS_GTID_EVENT: u8 = 34;
const PREVIOUS_GTIDS_EVENT: u8 = 35;

/// Tagged dispatch over a binlog event's type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Rotate,
    FormatDescription,
    Query,
    Xid,
    TableMap,
    WriteRows { v2: bool },
    UpdateRows { v2: bool },
    DeleteRows { v2: bool },
    Gtid,
    PreviousGtids,
    Rand,
    IntVar,
    RowsQuery,
    Other(u8),
}

impl EventKind {
    fn from_type_code(code: u8) -> Self {
        match code {
            ROTATE_EVENT => EventKind::Rotate,
            FORMAT_DESCRIPTION_EVENT => EventKind::FormatDescription,
            QUERY_EVENT => EventKind::Query,
            XID_EVENT => EventKind::Xid,
            TABLE_MAP_EVENT => EventKind::TableMap,
            WRITE_ROWS_EVENT_V1 => EventKind::WriteRows { v2: false },
            WRITE_ROWS_EVENT_V2 => EventKind::WriteRows { v2: true },
            UPDATE_ROWS_EVENT_V1 => EventKind::UpdateRows { v2: false },
            UPDATE_ROWS_EVENT_V2 => EventKind::UpdateRows { v2: true },
            DELETE_ROWS_EVENT_V1 => EventKind::DeleteRows { v2: false },
            DELETE_ROWS_EVENT_V2 => EventKind::DeleteRows { v2: true },
            GTID_EVENT | ANONYMOUS_GTID_EVENT => EventKind::Gtid,
            PREVIOUS_GTIDS_EVENT => EventKind::PreviousGtids,
            RAND_EVENT => EventKind::Rand,
            INTVAR_EVENT => EventKind::IntVar,
            ROWS_QUERY_EVENT => EventKind::RowsQuery,
            other => EventKind::Other(other),
        }
    }
}

/// One decoded binlog event: header plus body with the checksum already
/// stripped. The checksum itself is never verified, only discarded.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub header: EventHeader,
    pub kind: EventKind,
    pub body: Vec<u8>,
}

impl RawEvent {
    /// True when the event's declared length is at least as long as the
    /// common header.
    pub fn is_valid(&self) -> bool {
        self.header.event_length as usize >= COMMON_HEADER_LEN
    }
}

/// Result of interpreting one dump-stream packet's status-byte prefix.
pub enum DumpPacket {
    Event(RawEvent),
    Eof,
}

/// Interprets a single packet read from the binlog dump stream.
pub fn parse_dump_packet(packet: &[u8], format: &BinlogFormat) -> Result<DumpPacket> {
    match packet.first() {
        Some(&STATUS_EVENT) => Ok(DumpPacket::Event(parse_event(&packet[1..], format)?)),
        Some(&STATUS_EOF) => Ok(DumpPacket::Eof),
        Some(&STATUS_ERROR) => {
            let err = ErrorPacket::parse(packet)?;
            Err(Error::Server {
                code: err.code,
                message: err.message,
            })
        }
        _ => Err(ProtocolError::Malformed("empty dump-stream packet".to_string()).into()),
    }
}

fn parse_event(bytes: &[u8], format: &BinlogFormat) -> Result<RawEvent> {
    let header = EventHeader::parse(bytes)?;
    let header_length = if format.header_length == 0 {
        COMMON_HEADER_LEN
    } else {
        format.header_length as usize
    };
    let body = bytes
        .get(header_length..)
        .ok_or_else(|| ProtocolError::Malformed("event shorter than its header".to_string()))?;
    let body = strip_checksum(body, format)?;
    let kind = EventKind::from_type_code(header.type_code);
    Ok(RawEvent {
        header,
        kind,
        body: body.to_vec(),
    })
}

/// Trims the trailing 4-byte CRC32 when the learned format says one is
/// present. The checksum is discarded unverified.
fn strip_checksum<'a>(body: &'a [u8], format: &BinlogFormat) -> Result<&'a [u8]> {
    match format.checksum {
        ChecksumAlgorithm::None => Ok(body),
        ChecksumAlgorithm::Crc32 => body
            .len()
            .checked_sub(4)
            .map(|len| &body[..len])
            .ok_or_else(|| {
                ProtocolError::Malformed("event body shorter than its checksum".to_string()).into()
            }),
    }
}
