//! The initial handshake packet (protocol v10): server version, connection
//! id, auth-plugin-data seed split across two chunks, capability flags
//! split across two halves, charset, status flags, and the auth plugin
//! name.

use common::error::{ConnectError, Error, ProtocolError};

use crate::capability::CapabilityFlags;

const MIN_PROTOCOL_VERSION: u8 = 10;

#[derive(Debug, Clone)]
pub struct HandshakePacket {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: Vec<u8>,
    pub server_capabilities: CapabilityFlags,
    pub character_set: u8,
    pub status_flags: u16,
    pub auth_plugin_name: String,
}

impl HandshakePacket {
    pub fn parse(packet: &[u8]) -> Result<Self, Error> {
        if packet.is_empty() {
            return Err(malformed("empty handshake packet"));
        }
        let protocol_version = packet[0];
        if protocol_version < MIN_PROTOCOL_VERSION {
            return Err(Error::Connect(ConnectError::OldProtocol(protocol_version)));
        }

        let version_end = packet[1..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| malformed("server version not null terminated"))?
            + 1;
        let server_version = String::from_utf8_lossy(&packet[1..version_end]).into_owned();

        let mut pos = version_end + 1;
        let connection_id = read_u32(packet, pos)?;
        pos += 4;

        let mut scramble = packet
            .get(pos..pos + 8)
            .ok_or_else(|| malformed("handshake cipher (part 1) truncated"))?
            .to_vec();
        pos += 8 + 1; // cipher part 1, filler byte

        let capabilities_lower = read_u16(packet, pos)? as u32;
        pos += 2;

        let server_capabilities = if packet.len() > pos {
            let character_set = packet[pos];
            pos += 1;
            let status_flags = read_u16(packet, pos)?;
            pos += 2;
            let capabilities_upper = read_u16(packet, pos)? as u32;
            pos += 2;
            let auth_plugin_data_len = packet[pos];
            pos += 1 + 10; // auth-plugin-data-len byte, 10 reserved bytes

            let capabilities = capabilities_lower | (capabilities_upper << 16);
            let flags = CapabilityFlags::from_bits_truncate(capabilities);

            if flags.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
                let cipher_part2_len = (auth_plugin_data_len as usize)
                    .saturating_sub(8)
                    .max(13);
                let cipher_part2 = packet
                    .get(pos..pos + cipher_part2_len)
                    .ok_or_else(|| malformed("handshake cipher (part 2) truncated"))?;
                scramble.extend_from_slice(&cipher_part2[..cipher_part2_len.saturating_sub(1)]);
                pos += cipher_part2_len;
            }

            let auth_plugin_name = if flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
                let name_bytes = &packet[pos.min(packet.len())..];
                String::from_utf8_lossy(name_bytes)
                    .trim_end_matches('\0')
                    .to_string()
            } else {
                String::from("mysql_native_password")
            };

            return Ok(HandshakePacket {
                protocol_version,
                server_version,
                connection_id,
                scramble,
                server_capabilities: flags,
                character_set,
                status_flags,
                auth_plugin_name,
            });
        } else {
            CapabilityFlags::from_bits_truncate(capabilities_lower)
        };

        Ok(HandshakePacket {
            protocol_version,
            server_version,
            connection_id,
            scramble,
            server_capabilities,
            character_set: 0,
            status_flags: 0,
            auth_plugin_name: String::from("mysql_native_password"),
        })
    }
}

fn read_u32(packet: &[u8], pos: usize) -> Result<u32, Error> {
    let bytes = packet
        .get(pos..pos + 4)
        .ok_or_else(|| malformed("handshake packet truncated reading u32"))?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u16(packet: &[u8], pos: usize) -> Result<u16, Error> {
    let bytes = packet
        .get(pos..pos + 2)
        .ok_or_else(|| malformed("handshake packet truncated reading u16"))?;
    Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
}

fn malformed(msg: &str) -> Error {
    Error::Protocol(ProtocolError::Malformed(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_full_handshake(auth_plugin_name: &str) -> Vec<u8> {
        let mut p = Vec::new();
        p.push(10); // protocol version
        p.extend_from_slice(b"8.0.32\0");
        p.extend_from_slice(&42u32.to_le_bytes()); // connection id
        p.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]); // cipher part 1
        p.push(0); // filler

        let capabilities: u32 = 0x800A_A7FF; // includes SECURE_CONNECTION + PLUGIN_AUTH
        p.extend_from_slice(&(capabilities as u16).to_le_bytes());

        p.push(45); // character set
        p.extend_from_slice(&2u16.to_le_bytes()); // status flags
        p.extend_from_slice(&((capabilities >> 16) as u16).to_le_bytes());
        p.push(21); // auth-plugin-data-len
        p.extend_from_slice(&[0u8; 10]); // reserved

        let cipher_part2_len = (21usize).saturating_sub(8).max(13);
        let mut cipher2 = vec![9u8; cipher_part2_len - 1];
        cipher2.push(0);
        p.extend_from_slice(&cipher2);
        p.extend_from_slice(auth_plugin_name.as_bytes());
        p.push(0);
        p
    }

    #[test]
    fn parses_full_v10_handshake() {
        let raw = build_full_handshake("mysql_native_password");
        let handshake = HandshakePacket::parse(&raw).unwrap();
        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "8.0.32");
        assert_eq!(handshake.connection_id, 42);
        assert_eq!(handshake.scramble.len(), 20);
        assert_eq!(handshake.auth_plugin_name, "mysql_native_password");
        assert!(handshake
            .server_capabilities
            .contains(CapabilityFlags::CLIENT_PROTOCOL_41));
    }

    #[test]
    fn rejects_old_protocol_version() {
        let raw = [9u8, b'x', 0];
        let err = HandshakePacket::parse(&raw).unwrap_err();
        assert!(matches!(
            err,
            Error::Connect(ConnectError::OldProtocol(9))
        ));
    }
}
