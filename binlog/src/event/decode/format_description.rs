//! Format-description event decoder: learns the per-connection
//! [`BinlogFormat`] — the header length, the event-to-post-header-length
//! table and the checksum algorithm for every event from here on.

use byteorder::{ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

use crate::format::{BinlogFormat, ChecksumAlgorithm};

const SERVER_VERSION_LEN: usize = 50;
const FIXED_PREFIX_LEN: usize = 2 + SERVER_VERSION_LEN + 4 + 1;

/// Decodes a format-description event body (post-header onward).
///
/// The checksum-algorithm marker (present from `format_version >= 4`
/// onward) sits at the end of the post-header-length table, immediately
/// before this event's own 4-byte CRC tail if one is present — since this
/// is the event that announces the checksum algorithm, the transport layer
/// hasn't stripped anything yet, so that tail (if any) is still here. We
/// don't yet know whether it's present, so we try the CRC32 hypothesis
/// first (marker at `len - 5`); if that byte isn't `1`, we fall back to
/// treating the final byte as the marker with no trailing CRC.
pub fn decode(body: &[u8]) -> Result<BinlogFormat> {
    if body.len() < FIXED_PREFIX_LEN {
        return Err(truncated("format-description event shorter than its fixed prefix"));
    }

    let format_version = LittleEndian::read_u16(&body[0..2]);
    let server_version = read_fixed_c_string(&body[2..2 + SERVER_VERSION_LEN]);
    let header_length = body[FIXED_PREFIX_LEN - 1];
    let rest = &body[FIXED_PREFIX_LEN..];

    let (checksum, table) = if format_version >= 4 && !rest.is_empty() {
        if rest.len() >= 5 && rest[rest.len() - 5] == 1 {
            (ChecksumAlgorithm::Crc32, &rest[..rest.len() - 5])
        } else if *rest.last().unwrap() == 0 {
            (ChecksumAlgorithm::None, &rest[..rest.len() - 1])
        } else {
            (ChecksumAlgorithm::None, rest)
        }
    } else {
        (ChecksumAlgorithm::None, rest)
    };

    Ok(BinlogFormat {
        format_version,
        server_version,
        header_length,
        post_header_lengths: table.to_vec(),
        checksum,
    })
}

fn read_fixed_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn truncated(msg: &str) -> common::error::Error {
    ProtocolError::Malformed(msg.to_string()).into()
}
