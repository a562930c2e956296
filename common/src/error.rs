use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Uniform error type for the wire client and the binlog pipeline.
///
/// Propagation policy: nothing here is retried internally. A transport
/// error closes the connection and is surfaced as-is; an assembler error
/// aborts the stream. Callers resume by reconnecting at the last committed
/// position.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("binlog stream reached EOF")]
    StreamEof,

    #[error("streaming cancelled")]
    Cancelled,

    #[error("sink error: {0}")]
    Sink(String),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unsupported protocol version {0}, version 10 or higher is required")]
    OldProtocol(u8),

    #[error("the server doesn't support SSL encryption")]
    NoTls,

    #[error("server requested mysql_old_password authentication, which is disabled (allow_old_passwords=false)")]
    OldPassword,

    #[error("server requested mysql_clear_password authentication, which is disabled (allow_cleartext_passwords=false)")]
    CleartextPassword,

    #[error("server requested mysql_native_password authentication, which is disabled (allow_native_passwords=false)")]
    NativePassword,

    #[error("unsupported authentication plugin: {0}")]
    UnknownPlugin(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("packet sequence out of order: expected {expected}, got {got}")]
    PktSync { expected: u8, got: u8 },

    #[error("packet sequence jumped ahead: expected {expected}, got {got}")]
    PktSyncMul { expected: u8, got: u8 },

    #[error("packet payload of {0} bytes exceeds max_allowed_packet")]
    PktTooLarge(usize),

    #[error("unknown binlog event type {0}")]
    UnknownEventType(u8),

    #[error("unknown column type {0}")]
    UnknownColumnType(u8),

    #[error("connection is unusable")]
    BadConn,

    #[error("decode error at offset {offset}: {message}")]
    Decode { offset: usize, message: String },
}
