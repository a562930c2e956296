pub mod codec;
pub mod collation;
pub mod error;
pub mod log;

pub use error::{ConnectError, Error, ProtocolError, Result};
