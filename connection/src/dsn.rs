//! DSN parsing: `[user[:pass]@][net[(addr)]]/[dbname][?k=v&...]`.
//!
//! The DSN is parsed by hand (split on `@`, `/`, `?`) rather than pulled
//! through a URL crate, since this grammar is not a URL.

use std::collections::HashMap;
use std::time::Duration;

use common::error::{Error, ProtocolError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub username: String,
    pub password: String,
    pub net: String,
    pub addr: String,
    pub dbname: String,
    pub charset: Vec<String>,
    pub collation: String,
    pub loc: Option<String>,
    pub max_allowed_packet: u64,
    pub parse_time: bool,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    pub allow_native_passwords: bool,
    pub allow_old_passwords: bool,
    pub allow_cleartext_passwords: bool,
    pub client_found_rows: bool,
    pub columns_with_alias: bool,
    pub multi_statements: bool,
    pub strict: bool,
    pub tls: Option<String>,
    /// Any key not recognized above; each becomes `SET <key>=<val>` after
    /// handshake.
    pub extra_params: Vec<(String, String)>,
}

impl Dsn {
    pub fn parse(dsn: &str) -> Result<Dsn, Error> {
        let (auth_and_net, path_and_query) = dsn
            .rsplit_once('/')
            .ok_or_else(|| malformed("DSN missing '/' before dbname"))?;

        let (auth, net_addr) = match auth_and_net.rsplit_once('@') {
            Some((auth, net_addr)) => (Some(auth), net_addr),
            None => (None, auth_and_net),
        };

        let (username, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((u, p)) => (u.to_string(), p.to_string()),
                None => (auth.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        let (net, addr) = parse_net_addr(net_addr);

        let (dbname, query) = match path_and_query.split_once('?') {
            Some((db, q)) => (db.to_string(), q),
            None => (path_and_query.to_string(), ""),
        };

        let params = parse_query(query);

        let mut dsn = Dsn {
            username,
            password,
            net,
            addr,
            dbname,
            charset: Vec::new(),
            collation: common::collation::DEFAULT_COLLATION.to_string(),
            loc: None,
            max_allowed_packet: 0,
            parse_time: false,
            read_timeout: None,
            write_timeout: None,
            timeout: None,
            allow_native_passwords: true,
            allow_old_passwords: false,
            allow_cleartext_passwords: false,
            client_found_rows: false,
            columns_with_alias: false,
            multi_statements: false,
            strict: false,
            tls: None,
            extra_params: Vec::new(),
        };

        for (key, value) in params {
            match key.as_str() {
                "charset" => dsn.charset = value.split(',').map(str::to_string).collect(),
                "collation" => dsn.collation = value,
                "loc" => dsn.loc = Some(url_unescape(&value)),
                "maxAllowedPacket" => {
                    dsn.max_allowed_packet = value.parse().map_err(|_| {
                        malformed("maxAllowedPacket must be an integer")
                    })?
                }
                "parseTime" => dsn.parse_time = parse_bool(&value)?,
                "readTimeout" => dsn.read_timeout = Some(parse_duration(&value)?),
                "writeTimeout" => dsn.write_timeout = Some(parse_duration(&value)?),
                "timeout" => dsn.timeout = Some(parse_duration(&value)?),
                "allowNativePasswords" => dsn.allow_native_passwords = parse_bool(&value)?,
                "allowOldPasswords" => dsn.allow_old_passwords = parse_bool(&value)?,
                "allowCleartextPasswords" => dsn.allow_cleartext_passwords = parse_bool(&value)?,
                "clientFoundRows" => dsn.client_found_rows = parse_bool(&value)?,
                "columnsWithAlias" => dsn.columns_with_alias = parse_bool(&value)?,
                "multiStatements" => dsn.multi_statements = parse_bool(&value)?,
                "strict" => dsn.strict = parse_bool(&value)?,
                "tls" => dsn.tls = Some(value),
                other => dsn.extra_params.push((other.to_string(), value)),
            }
        }

        Ok(dsn)
    }
}

fn parse_net_addr(net_addr: &str) -> (String, String) {
    if net_addr.is_empty() {
        return ("tcp".to_string(), "127.0.0.1:3306".to_string());
    }
    match net_addr.split_once('(') {
        Some((net, rest)) => {
            let addr = rest.strip_suffix(')').unwrap_or(rest);
            (net.to_string(), addr.to_string())
        }
        None => ("tcp".to_string(), net_addr.to_string()),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_unescape(k), url_unescape(v)),
            None => (url_unescape(pair), String::new()),
        })
        .collect()
}

fn parse_bool(value: &str) -> Result<bool, Error> {
    match value {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(malformed(&format!("invalid boolean value {value:?}"))),
    }
}

fn parse_duration(value: &str) -> Result<Duration, Error> {
    let (digits, unit) = value
        .find(|c: char| !c.is_ascii_digit())
        .map(|idx| value.split_at(idx))
        .ok_or_else(|| malformed("duration missing unit suffix"))?;
    let amount: u64 = digits
        .parse()
        .map_err(|_| malformed("duration must start with digits"))?;
    let multiplier = match unit {
        "ms" => 1,
        "s" => 1000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => return Err(malformed(&format!("unknown duration suffix {other:?}"))),
    };
    Ok(Duration::from_millis(amount * multiplier))
}

/// Minimal `%XX` unescaping; the grammar only ever needs this for `loc` and
/// the rare query value containing a reserved character.
fn url_unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&value[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn malformed(msg: &str) -> Error {
    Error::Protocol(ProtocolError::Malformed(msg.to_string()))
}

/// Helper exposed for `conn::options` to turn a parsed DSN's `extra_params`
/// into the `SET key=val` statements issued post-auth.
pub fn extra_params_as_map(dsn: &Dsn) -> HashMap<String, String> {
    dsn.extra_params.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_dsn() {
        let dsn = Dsn::parse("repl:secret@tcp(127.0.0.1:3306)/?charset=utf8mb4&parseTime=true")
            .unwrap();
        assert_eq!(dsn.username, "repl");
        assert_eq!(dsn.password, "secret");
        assert_eq!(dsn.net, "tcp");
        assert_eq!(dsn.addr, "127.0.0.1:3306");
        assert_eq!(dsn.dbname, "");
        assert_eq!(dsn.charset, vec!["utf8mb4".to_string()]);
        assert!(dsn.parse_time);
    }

    #[test]
    fn parses_dsn_with_no_auth_or_query() {
        let dsn = Dsn::parse("tcp(localhost:3306)/testdb").unwrap();
        assert_eq!(dsn.username, "");
        assert_eq!(dsn.dbname, "testdb");
    }

    #[test]
    fn parses_user_without_password() {
        let dsn = Dsn::parse("repl@tcp(host:3306)/").unwrap();
        assert_eq!(dsn.username, "repl");
        assert_eq!(dsn.password, "");
    }

    #[test]
    fn unknown_key_becomes_extra_param() {
        let dsn = Dsn::parse("u:p@tcp(h:3306)/db?sql_log_bin=0").unwrap();
        assert_eq!(dsn.extra_params, vec![("sql_log_bin".to_string(), "0".to_string())]);
    }

    #[test]
    fn rejects_dsn_without_slash() {
        assert!(Dsn::parse("u:p@tcp(h:3306)").is_err());
    }

    #[test]
    fn parses_timeout_suffix() {
        let dsn = Dsn::parse("u:p@tcp(h:3306)/db?timeout=30s").unwrap();
        assert_eq!(dsn.timeout, Some(Duration::from_secs(30)));
    }
}
