//! Query event decoder:
//! `[slave_proxy_id:u32le][execution_time:u32le][schema_len:u8][error_code:u16le]
//!  [status_vars_len:u16le][status_vars][schema][0x00][query:EOF-string]`.
//! Status variables are skipped over, not interpreted — nothing downstream
//! needs session-level state like autoincrement seeds or SQL mode flags.

use byteorder::{ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

pub struct Query {
    pub schema: String,
    pub sql: String,
}

pub fn decode(body: &[u8]) -> Result<Query> {
    let schema_len = *body
        .get(4)
        .ok_or_else(|| truncated("query event missing schema length"))? as usize;
    let status_vars_len = body
        .get(10..12)
        .map(LittleEndian::read_u16)
        .ok_or_else(|| truncated("query event missing status-vars length"))? as usize;

    let mut offset = 12 + status_vars_len;
    let schema_bytes = body
        .get(offset..offset + schema_len)
        .ok_or_else(|| truncated("query event schema truncated"))?;
    let schema = String::from_utf8_lossy(schema_bytes).into_owned();
    offset += schema_len;

    let term = *body
        .get(offset)
        .ok_or_else(|| truncated("query event missing schema terminator"))?;
    if term != 0 {
        return Err(truncated("query event schema missing null terminator"));
    }
    offset += 1;

    let sql = String::from_utf8_lossy(&body[offset..]).into_owned();
    Ok(Query { schema, sql })
}

fn truncated(msg: &str) -> common::error::Error {
    ProtocolError::Malformed(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sql: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes()); // slave_proxy_id
        body.extend_from_slice(&0u32.to_le_bytes()); // execution_time
        body.push(4); // schema_len
        body.extend_from_slice(&0u16.to_le_bytes()); // error_code
        body.extend_from_slice(&0u16.to_le_bytes()); // status_vars_len
        body.extend_from_slice(b"test");
        body.push(0);
        body.extend_from_slice(sql.as_bytes());
        body
    }

    #[test]
    fn decodes_begin_statement() {
        let q = decode(&sample("BEGIN")).unwrap();
        assert_eq!(q.schema, "test");
        assert_eq!(q.sql, "BEGIN");
    }
}
