//! XID event decoder: an opaque 8-byte transaction id, treated as an
//! implicit commit marker.

use byteorder::{ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

pub fn decode(body: &[u8]) -> Result<u64> {
    let bytes = body
        .get(0..8)
        .ok_or_else(|| ProtocolError::Malformed("xid event shorter than 8 bytes".to_string()))?;
    Ok(LittleEndian::read_u64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_transaction_id() {
        assert_eq!(decode(&42u64.to_le_bytes()).unwrap(), 42);
    }

    #[test]
    fn rejects_short_body() {
        assert!(decode(&[0u8; 4]).is_err());
    }
}
