//! Connection settings, trimmed of the binlog-position/env fields that
//! belong to the higher-level streamer instead (this crate never depends
//! on `binlog`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use native_tls::Identity;

use common::error::{ConnectError, Error};

use crate::dsn::Dsn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disabled,
    Preferred,
    Required,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub ssl_mode: SslMode,
    pub ssl_opts: Option<SslOpts>,
    pub collation: String,
    pub read_timeout: Duration,
    pub write_timeout: Option<Duration>,
    pub allow_native_passwords: bool,
    pub allow_old_passwords: bool,
    pub allow_cleartext_passwords: bool,
    pub client_found_rows: bool,
    pub multi_statements: bool,
    pub max_allowed_packet: u64,
    /// Post-handshake `SET` statements from DSN options not otherwise
    /// recognized.
    pub extra_session_params: Vec<(String, String)>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 3306,
            username: String::new(),
            password: String::new(),
            database: None,
            ssl_mode: SslMode::Disabled,
            ssl_opts: None,
            collation: common::collation::DEFAULT_COLLATION.to_string(),
            read_timeout: Duration::from_secs(30),
            write_timeout: None,
            allow_native_passwords: true,
            allow_old_passwords: false,
            allow_cleartext_passwords: false,
            client_found_rows: false,
            multi_statements: false,
            max_allowed_packet: 0,
            extra_session_params: Vec::new(),
        }
    }
}

impl ConnectionOptions {
    pub fn from_dsn(dsn: &Dsn) -> Result<Self, Error> {
        let ssl_mode = match dsn.tls.as_deref() {
            None | Some("false") => SslMode::Disabled,
            Some("preferred") => SslMode::Preferred,
            Some(_) => SslMode::Required,
        };
        let (hostname, port) = split_addr(&dsn.addr)?;

        Ok(Self {
            hostname,
            port,
            username: dsn.username.clone(),
            password: dsn.password.clone(),
            database: if dsn.dbname.is_empty() {
                None
            } else {
                Some(dsn.dbname.clone())
            },
            ssl_mode,
            ssl_opts: None,
            collation: dsn.collation.clone(),
            read_timeout: dsn.read_timeout.unwrap_or(Duration::from_secs(30)),
            write_timeout: dsn.write_timeout,
            allow_native_passwords: dsn.allow_native_passwords,
            allow_old_passwords: dsn.allow_old_passwords,
            allow_cleartext_passwords: dsn.allow_cleartext_passwords,
            client_found_rows: dsn.client_found_rows,
            multi_statements: dsn.multi_statements,
            max_allowed_packet: dsn.max_allowed_packet,
            extra_session_params: dsn.extra_params.clone(),
        })
    }
}

fn split_addr(addr: &str) -> Result<(String, u16), Error> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| Error::Connect(ConnectError::Other(format!("invalid address {addr:?}"))))?;
    let port: u16 = port
        .parse()
        .map_err(|_| Error::Connect(ConnectError::Other(format!("invalid port in {addr:?}"))))?;
    Ok((host.to_string(), port))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslOpts {
    pub client_identity: Option<ClientIdentity>,
    pub root_cert_path: Option<PathBuf>,
    pub skip_domain_validation: bool,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub pkcs12_path: PathBuf,
    pub password: Option<String>,
}

impl ClientIdentity {
    pub fn load(&self) -> Result<Identity, Error> {
        let der = std::fs::read(&self.pkcs12_path)?;
        Identity::from_pkcs12(&der, self.password.as_deref().unwrap_or(""))
            .map_err(|e| Error::Connect(ConnectError::Other(format!("cannot load identity: {e}"))))
    }
}

impl SslOpts {
    pub fn root_cert_path(&self) -> Option<&Path> {
        self.root_cert_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_options_from_dsn() {
        let dsn = Dsn::parse("repl:secret@tcp(127.0.0.1:3306)/mydb").unwrap();
        let opts = ConnectionOptions::from_dsn(&dsn).unwrap();
        assert_eq!(opts.hostname, "127.0.0.1");
        assert_eq!(opts.port, 3306);
        assert_eq!(opts.database.as_deref(), Some("mydb"));
    }

    #[test]
    fn defaults_to_disabled_tls() {
        let dsn = Dsn::parse("u:p@tcp(h:3306)/db").unwrap();
        let opts = ConnectionOptions::from_dsn(&dsn).unwrap();
        assert_eq!(opts.ssl_mode, SslMode::Disabled);
    }
}
