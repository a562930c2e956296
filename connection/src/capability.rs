//! Client/server capability flags, the handshake subset used by this
//! client. Grounded on `connection/src/declar/capability_flags.rs`, ported
//! from loose `const u64` to a `bitflags!` set since every flag here is
//! used only through set membership (`contains`/`union`), never arithmetic.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilityFlags: u32 {
        const CLIENT_LONG_PASSWORD     = 0x0000_0001;
        const CLIENT_FOUND_ROWS        = 0x0000_0002;
        const CLIENT_LONG_FLAG         = 0x0000_0004;
        const CLIENT_CONNECT_WITH_DB   = 0x0000_0008;
        const CLIENT_LOCAL_FILES       = 0x0000_0080;
        const CLIENT_PROTOCOL_41       = 0x0000_0200;
        const CLIENT_SSL               = 0x0000_0800;
        const CLIENT_TRANSACTIONS      = 0x0000_2000;
        const CLIENT_SECURE_CONNECTION = 0x0000_8000;
        const CLIENT_MULTI_STATEMENTS  = 0x0001_0000;
        const CLIENT_MULTI_RESULTS     = 0x0002_0000;
        const CLIENT_PLUGIN_AUTH       = 0x0008_0000;
    }
}

/// The capabilities this client always requires of the server. A handshake
/// whose advertised capabilities don't cover these is refused.
pub const REQUIRED: CapabilityFlags = CapabilityFlags::CLIENT_PROTOCOL_41
    .union(CapabilityFlags::CLIENT_SECURE_CONNECTION)
    .union(CapabilityFlags::CLIENT_LONG_PASSWORD)
    .union(CapabilityFlags::CLIENT_TRANSACTIONS)
    .union(CapabilityFlags::CLIENT_LOCAL_FILES)
    .union(CapabilityFlags::CLIENT_PLUGIN_AUTH)
    .union(CapabilityFlags::CLIENT_MULTI_RESULTS);
