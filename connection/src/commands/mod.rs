//! Command packets the client issues after the handshake. Grounded on
//! `connection/src/commands/{dump_binlog_command,query_command,
//! authenticate_command}.rs`.

use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::capability::CapabilityFlags;
use crate::conn::options::ConnectionOptions;
use crate::packet::handshake::HandshakePacket;
use crate::scramble::{scramble_native, scramble_old};

#[repr(u8)]
pub enum CommandType {
    Quit = 0x01,
    Query = 0x03,
    BinlogDump = 0x12,
}

fn write_null_term_string(cursor: &mut Cursor<&mut Vec<u8>>, s: &str) -> io::Result<()> {
    cursor.write_all(s.as_bytes())?;
    cursor.write_u8(0)
}

pub struct QueryCommand {
    pub sql: String,
}

impl QueryCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut vec = Vec::new();
        let mut cursor = Cursor::new(&mut vec);
        cursor.write_u8(CommandType::Query as u8)?;
        cursor.write_all(self.sql.as_bytes())?;
        Ok(vec)
    }
}

pub struct QuitCommand;

impl QuitCommand {
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        Ok(vec![CommandType::Quit as u8])
    }
}

/// `COM_BINLOG_DUMP`: `[0x12][position:u32le][flags:u16le][server_id:u32le][filename]`.
pub struct DumpBinlogCommand {
    pub server_id: u32,
    pub binlog_filename: String,
    pub binlog_position: u64,
    pub flags: u16,
}

impl DumpBinlogCommand {
    pub fn new(server_id: u32, binlog_filename: String, binlog_position: u64) -> Self {
        Self {
            server_id,
            binlog_filename,
            binlog_position,
            flags: 0,
        }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut vec = Vec::new();
        let mut cursor = Cursor::new(&mut vec);
        cursor.write_u8(CommandType::BinlogDump as u8)?;
        cursor.write_u32::<LittleEndian>(self.binlog_position as u32)?;
        cursor.write_u16::<LittleEndian>(self.flags)?;
        cursor.write_u32::<LittleEndian>(self.server_id)?;
        cursor.write_all(self.binlog_filename.as_bytes())?;
        Ok(vec)
    }
}

pub struct SslRequestCommand {
    pub client_capabilities: CapabilityFlags,
    pub client_collation: u8,
}

impl SslRequestCommand {
    pub fn new(client_capabilities: CapabilityFlags, client_collation: u8) -> Self {
        Self {
            client_capabilities: client_capabilities | CapabilityFlags::CLIENT_SSL,
            client_collation,
        }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut vec = Vec::new();
        let mut cursor = Cursor::new(&mut vec);
        cursor.write_u32::<LittleEndian>(self.client_capabilities.bits())?;
        cursor.write_u32::<LittleEndian>(0)?; // max packet size
        cursor.write_u8(self.client_collation)?;
        for _ in 0..23 {
            cursor.write_u8(0)?;
        }
        Ok(vec)
    }
}

/// `HandshakeResponse41`, grounded on
/// `connection/src/commands/authenticate_command.rs`.
pub struct AuthenticateCommand {
    pub client_capabilities: CapabilityFlags,
    pub client_collation: u8,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub scramble: Vec<u8>,
    pub auth_plugin_name: String,
}

impl AuthenticateCommand {
    pub fn new(
        options: &ConnectionOptions,
        handshake: &HandshakePacket,
        client_collation: u8,
    ) -> Self {
        let mut client_capabilities = CapabilityFlags::CLIENT_LONG_FLAG
            | CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_SECURE_CONNECTION
            | CapabilityFlags::CLIENT_LONG_PASSWORD
            | CapabilityFlags::CLIENT_TRANSACTIONS
            | CapabilityFlags::CLIENT_PLUGIN_AUTH
            | CapabilityFlags::CLIENT_MULTI_RESULTS;

        if options.database.is_some() {
            client_capabilities |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        }

        Self {
            client_capabilities,
            client_collation,
            username: options.username.clone(),
            password: options.password.clone(),
            database: options.database.clone(),
            scramble: handshake.scramble.clone(),
            auth_plugin_name: handshake.auth_plugin_name.clone(),
        }
    }

    fn scrambled_password(&self) -> Vec<u8> {
        match self.auth_plugin_name.as_str() {
            "mysql_old_password" => scramble_old(&self.scramble, self.password.as_bytes()),
            "mysql_clear_password" => self.password.as_bytes().to_vec(),
            _ => scramble_native(&self.scramble, self.password.as_bytes()),
        }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut vec = Vec::new();
        let mut cursor = Cursor::new(&mut vec);

        cursor.write_u32::<LittleEndian>(self.client_capabilities.bits())?;
        cursor.write_u32::<LittleEndian>(0)?; // max packet size
        cursor.write_u8(self.client_collation)?;
        for _ in 0..23 {
            cursor.write_u8(0)?;
        }

        write_null_term_string(&mut cursor, &self.username)?;

        let scrambled = self.scrambled_password();
        cursor.write_u8(scrambled.len() as u8)?;
        cursor.write_all(&scrambled)?;

        if let Some(database) = &self.database {
            write_null_term_string(&mut cursor, database)?;
        }

        write_null_term_string(&mut cursor, &self.auth_plugin_name)?;
        Ok(vec)
    }
}

/// Response to an `AuthSwitchRequest`: re-scrambles the password under the
/// plugin the server asked for.
pub struct AuthSwitchResponseCommand {
    pub password: String,
    pub cipher: Vec<u8>,
    pub auth_plugin_name: String,
}

impl AuthSwitchResponseCommand {
    pub fn new(password: impl Into<String>, cipher: Vec<u8>, auth_plugin_name: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            cipher,
            auth_plugin_name: auth_plugin_name.into(),
        }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let scrambled = match self.auth_plugin_name.as_str() {
            "mysql_old_password" => scramble_old(&self.cipher, self.password.as_bytes()),
            "mysql_clear_password" => {
                let mut v = self.password.as_bytes().to_vec();
                v.push(0);
                v
            }
            _ => scramble_native(&self.cipher, self.password.as_bytes()),
        };
        Ok(scrambled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_command_prefixes_com_query_byte() {
        let serialized = QueryCommand::new("SELECT 1").serialize().unwrap();
        assert_eq!(serialized[0], CommandType::Query as u8);
        assert_eq!(&serialized[1..], b"SELECT 1");
    }

    #[test]
    fn dump_binlog_command_layout() {
        let cmd = DumpBinlogCommand::new(101, "mysql-bin.000001".to_string(), 4);
        let serialized = cmd.serialize().unwrap();
        assert_eq!(serialized[0], CommandType::BinlogDump as u8);
        assert_eq!(
            u32::from_le_bytes(serialized[1..5].try_into().unwrap()),
            4
        );
        assert_eq!(
            u32::from_le_bytes(serialized[7..11].try_into().unwrap()),
            101
        );
        assert_eq!(&serialized[11..], b"mysql-bin.000001");
    }

    #[test]
    fn quit_command_is_single_byte() {
        assert_eq!(QuitCommand.serialize().unwrap(), vec![CommandType::Quit as u8]);
    }
}
