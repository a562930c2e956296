//! Error packet parsing (leading `0xFF`), grounded on
//! `original_source/dump/packets.go`'s `handleErrorPacket`. No teacher file
//! for this survived retrieval.

use common::error::Error;

const SQL_STATE_MARKER: u8 = b'#';

#[derive(Debug, Clone)]
pub struct ErrorPacket {
    pub code: u16,
    pub sql_state: Option<String>,
    pub message: String,
}

impl ErrorPacket {
    pub fn parse(packet: &[u8]) -> Result<Self, Error> {
        let body = &packet[1..]; // drop the 0xFF marker
        let code = u16::from_le_bytes([body[0], body[1]]);

        let (sql_state, message_start) = if body.get(2) == Some(&SQL_STATE_MARKER) {
            let state = String::from_utf8_lossy(&body[3..8]).into_owned();
            (Some(state), 8)
        } else {
            (None, 2)
        };

        let message = String::from_utf8_lossy(&body[message_start..]).into_owned();

        Ok(Self {
            code,
            sql_state,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_with_sql_state() {
        let mut raw = vec![0xFF];
        raw.extend_from_slice(&1045u16.to_le_bytes());
        raw.push(b'#');
        raw.extend_from_slice(b"28000");
        raw.extend_from_slice(b"Access denied");
        let err = ErrorPacket::parse(&raw).unwrap();
        assert_eq!(err.code, 1045);
        assert_eq!(err.sql_state.as_deref(), Some("28000"));
        assert_eq!(err.message, "Access denied");
    }

    #[test]
    fn parses_error_without_sql_state() {
        let mut raw = vec![0xFF];
        raw.extend_from_slice(&2013u16.to_le_bytes());
        raw.extend_from_slice(b"Lost connection");
        let err = ErrorPacket::parse(&raw).unwrap();
        assert_eq!(err.code, 2013);
        assert!(err.sql_state.is_none());
        assert_eq!(err.message, "Lost connection");
    }
}
