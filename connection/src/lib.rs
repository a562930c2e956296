//! Packet transport and connection lifecycle (handshake, authentication,
//! command execution) for a MySQL-compatible server. Deliberately has no
//! dependency on the `binlog` crate — the stream assembler references this
//! crate, never the reverse.

pub mod capability;
pub mod commands;
pub mod conn;
pub mod dsn;
pub mod packet;
pub mod scramble;
pub mod status;

pub use conn::options::{ConnectionOptions, SslMode, SslOpts};
pub use conn::{Connection, ShutdownHandle};
pub use dsn::Dsn;
pub use packet::PacketChannel;
