//! Rotate event decoder: `[position:u64le][filename:EOF-string]`.

use byteorder::{ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

pub struct Rotate {
    pub filename: String,
    pub position: u64,
}

pub fn decode(body: &[u8]) -> Result<Rotate> {
    let position_bytes = body
        .get(0..8)
        .ok_or_else(|| ProtocolError::Malformed("rotate event shorter than 8 bytes".to_string()))?;
    let position = LittleEndian::read_u64(position_bytes);
    let filename = String::from_utf8_lossy(&body[8..]).into_owned();
    Ok(Rotate { filename, position })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_filename_and_position() {
        let mut body = 4u64.to_le_bytes().to_vec();
        body.extend_from_slice(b"binlog.000005");
        let rotate = decode(&body).unwrap();
        assert_eq!(rotate.filename, "binlog.000005");
        assert_eq!(rotate.position, 4);
    }
}
