//! Packet transport: the 4-byte header framing (`[len:u24le][seq:u8]`) every
//! classic MySQL packet rides on, with sequence checking and >16MiB
//! fragmentation both handled explicitly — skipping either would desync
//! silently against a server that fragments a packet across multiple
//! on-wire chunks.

pub mod error;
pub mod handshake;
pub mod ok;

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::{io, net};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use native_tls::{Certificate, TlsConnector};

use common::error::{ConnectError, Error, ProtocolError};

use crate::conn::options::{ConnectionOptions, SslOpts};

pub use self::error::ErrorPacket;
pub use self::ok::OkPacket;

pub const PACKET_HEADER_SIZE: usize = 4;
/// `2^24 - 1`: a packet this size or larger is followed by a continuation
/// packet with the same sequence number, terminated by a zero-length packet.
pub const MAX_BODY_LENGTH: usize = 0xFF_FFFF;

pub const RESPONSE_OK: u8 = 0x00;
pub const RESPONSE_EOF: u8 = 0xFE;
pub const RESPONSE_ERROR: u8 = 0xFF;
pub const RESPONSE_AUTH_SWITCH: u8 = 0xFE;

#[derive(Debug)]
pub struct PacketChannel {
    stream: ChannelStream,
    sequence: u8,
}

impl PacketChannel {
    pub fn new(options: &ConnectionOptions) -> Result<Self, Error> {
        let address = format!("{}:{}", options.hostname, options.port);
        let stream = TcpStream::connect(&address)?;
        stream.set_read_timeout(Some(options.read_timeout))?;
        Ok(Self {
            stream: ChannelStream::Tcp(stream),
            sequence: 0,
        })
    }

    pub fn is_ssl(&self) -> bool {
        matches!(self.stream, ChannelStream::Tls(_))
    }

    /// Resets the sequence counter to zero; issued before every new command
    /// per the classic protocol's "sequence restarts at each command" rule.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    pub fn read_packet(&mut self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        loop {
            let mut header = [0u8; PACKET_HEADER_SIZE];
            if self.stream.read_exact(&mut header).is_err() {
                return Err(Error::Protocol(ProtocolError::BadConn));
            }
            let packet_len = (&header[0..3]).read_u24::<LittleEndian>()? as usize;
            let seq_num = header[3];

            if seq_num != self.sequence {
                return Err(if seq_num > self.sequence {
                    Error::Protocol(ProtocolError::PktSyncMul {
                        expected: self.sequence,
                        got: seq_num,
                    })
                } else {
                    Error::Protocol(ProtocolError::PktSync {
                        expected: self.sequence,
                        got: seq_num,
                    })
                });
            }
            self.sequence = self.sequence.wrapping_add(1);

            if packet_len == 0 {
                if body.is_empty() {
                    return Err(Error::Protocol(ProtocolError::BadConn));
                }
                return Ok(body);
            }

            let mut chunk = vec![0u8; packet_len];
            if self.stream.read_exact(&mut chunk).is_err() {
                return Err(Error::Protocol(ProtocolError::BadConn));
            }
            body.extend_from_slice(&chunk);

            if packet_len < MAX_BODY_LENGTH {
                return Ok(body);
            }
        }
    }

    pub fn write_packet(&mut self, payload: &[u8]) -> Result<(), Error> {
        let mut remaining = payload;
        loop {
            let chunk_len = remaining.len().min(MAX_BODY_LENGTH);
            let (chunk, rest) = remaining.split_at(chunk_len);

            self.stream.write_u24::<LittleEndian>(chunk_len as u32)?;
            self.stream.write_u8(self.sequence)?;
            self.stream.write_all(chunk)?;
            self.sequence = self.sequence.wrapping_add(1);

            if chunk_len < MAX_BODY_LENGTH {
                return Ok(());
            }
            remaining = rest;
        }
    }

    pub fn upgrade_to_ssl(self, options: &ConnectionOptions) -> Result<Self, Error> {
        let ssl_opts = options
            .ssl_opts
            .clone()
            .ok_or_else(|| connect_err("SSL requested but no SSL options configured"))?;

        let domain = options.hostname.clone();
        let mut builder = TlsConnector::builder();
        configure_tls_builder(&mut builder, &ssl_opts)?;
        let connector = builder
            .build()
            .map_err(|e| connect_err(&format!("cannot build TLS connector: {e}")))?;

        match self.stream {
            ChannelStream::Tcp(tcp) => {
                let tls = connector
                    .connect(&domain, tcp)
                    .map_err(|e| connect_err(&format!("TLS handshake failed: {e}")))?;
                Ok(Self {
                    stream: ChannelStream::Tls(tls),
                    sequence: self.sequence,
                })
            }
            ChannelStream::Tls(_) => Ok(self),
        }
    }

    pub fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown()
    }

    /// Clones the underlying TCP socket so another thread can force a
    /// blocked `read_packet` to return, for cancellation. For a TLS stream
    /// this clones the socket beneath the handshake, not
    /// the `TlsStream` itself — a forced shutdown skips `close_notify`,
    /// which is fine for cancellation (we are discarding the connection).
    pub fn try_clone_shutdown_handle(&self) -> io::Result<net::TcpStream> {
        self.stream.try_clone_tcp()
    }
}

fn configure_tls_builder(
    builder: &mut native_tls::TlsConnectorBuilder,
    ssl_opts: &SslOpts,
) -> Result<(), Error> {
    if let Some(root_cert_path) = &ssl_opts.root_cert_path {
        let mut data = Vec::new();
        File::open(root_cert_path)?.read_to_end(&mut data)?;
        let certs = match Certificate::from_der(&data) {
            Ok(cert) => vec![cert],
            Err(_) => pem::parse_many(&data)
                .unwrap_or_default()
                .iter()
                .map(pem::encode)
                .filter_map(|s| Certificate::from_pem(s.as_bytes()).ok())
                .collect(),
        };
        for cert in certs {
            builder.add_root_certificate(cert);
        }
    }
    builder.danger_accept_invalid_hostnames(ssl_opts.skip_domain_validation);
    builder.danger_accept_invalid_certs(ssl_opts.accept_invalid_certs);
    Ok(())
}

fn connect_err(msg: &str) -> Error {
    Error::Connect(ConnectError::Other(msg.to_string()))
}

enum ChannelStream {
    Tcp(net::TcpStream),
    Tls(native_tls::TlsStream<net::TcpStream>),
}

impl ChannelStream {
    fn shutdown(&mut self) -> io::Result<()> {
        match self {
            ChannelStream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            ChannelStream::Tls(stream) => stream.shutdown(),
        }
    }

    fn try_clone_tcp(&self) -> io::Result<net::TcpStream> {
        match self {
            ChannelStream::Tcp(stream) => stream.try_clone(),
            ChannelStream::Tls(stream) => stream.get_ref().try_clone(),
        }
    }
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ChannelStream::Tcp(stream) => stream.read(buf),
            ChannelStream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ChannelStream::Tcp(stream) => stream.write(buf),
            ChannelStream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ChannelStream::Tcp(stream) => stream.flush(),
            ChannelStream::Tls(stream) => stream.flush(),
        }
    }
}

impl fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStream::Tcp(s) => write!(f, "Tcp({s:?})"),
            ChannelStream::Tls(_) => write!(f, "Tls(..)"),
        }
    }
}

/// Turns a leading `0xFF` response byte into a `Server` error, per
/// `original_source/dump/packets.go`'s `handleErrorPacket`.
pub fn check_error_packet(packet: &[u8]) -> Result<(), Error> {
    if packet.first() == Some(&RESPONSE_ERROR) {
        let err = ErrorPacket::parse(packet)?;
        return Err(Error::Server {
            code: err.code,
            message: err.message,
        });
    }
    Ok(())
}
